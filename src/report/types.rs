use crate::reconciliation::{ReconciliationPlan, ReconciliationResult};
use crate::state::{ComparisonMode, StateDiff};
use serde::Serialize;
use std::path::PathBuf;

/// Which action produced a report
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    Sync,
    Export,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub schema_version: u32,
    pub tool_version: String,
    pub domain: String,
    pub action: RunAction,
    pub dry_run: bool,
    pub started_at: String,
    pub finished_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReconciliationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

/// Entity counts of a reconciliation plan
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub to_create: usize,
    pub to_update: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub remote_only: usize,
}

impl From<&ReconciliationPlan> for PlanSummary {
    fn from(plan: &ReconciliationPlan) -> Self {
        Self {
            to_create: plan.to_create.len(),
            to_update: plan.to_update.len(),
            up_to_date: plan.up_to_date.len(),
            skipped: plan.skipped.len(),
            remote_only: plan.remote_only.len(),
        }
    }
}

/// A CSV written by an export
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub path: PathBuf,
    pub sha256: String,
    pub rows: usize,
}

/// Outcome of comparing the CSV with the remote state
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub mode: ComparisonMode,
    pub matched: bool,
    pub diff: StateDiff,
}

impl Validation {
    /// Whether the run should succeed. A mismatch only fails a strict run
    /// that actually sent its changes.
    pub fn passes(&self, strict: bool, dry_run: bool) -> bool {
        self.matched || !strict || dry_run
    }
}
