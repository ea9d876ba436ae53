use super::plan::{EntityChange, MissingEntityPolicy, ReconciliationPlan};
use crate::config::DomainPaths;
use crate::databricks::ApiError;
use crate::report::ReportError;
use crate::state::{ComparisonMode, EntityState, StateMap};
use crate::table::TableError;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Skip reason recorded for planned changes during a dry run
pub const DRY_RUN: &str = "dry run";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    #[error("API error: {0}")]
    ApiError(#[from] ApiError),

    #[error("Report error: {0}")]
    ReportError(#[from] ReportError),

    #[error("Workspace setting {key} is '{actual}' after setting it to '{expected}'")]
    SettingNotApplied {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Result of applying a single change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Skipped(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedEntity {
    pub name: String,
    pub reason: String,
}

/// Result of reconciliation execution
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedEntity>,
    pub unchanged: Vec<String>,
}

impl ReconciliationResult {
    fn skip(&mut self, name: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedEntity {
            name: name.to_string(),
            reason: reason.into(),
        });
    }
}

/// One kind of access state kept in sync with a CSV file.
///
/// The pipeline drives every domain the same way; implementors only know how
/// to load their CSV, read the remote side, apply a single change and render
/// an export row.
#[async_trait]
pub trait AccessDomain: Send + Sync {
    /// Short name used in logs and report file names
    fn name(&self) -> &'static str;

    fn paths(&self) -> &DomainPaths;

    fn comparison_mode(&self) -> ComparisonMode;

    fn missing_policy(&self) -> MissingEntityPolicy;

    /// Reason recorded for desired entities the plan skips
    fn skip_reason(&self) -> &'static str {
        "not present remotely"
    }

    /// Export header; also the columns the loader accepts
    fn export_headers(&self) -> &'static [&'static str];

    fn export_row(&self, entity: &EntityState) -> Vec<String>;

    /// Load the desired state from the input CSV
    async fn load_desired(&self) -> Result<StateMap, SyncError>;

    /// Read the current remote state
    async fn read_remote(&self) -> Result<StateMap, SyncError>;

    async fn create(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError>;

    async fn update(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError>;
}

/// Execute the reconciliation plan.
///
/// Changes are applied one at a time; the first API error aborts the run and
/// leaves already-applied changes in place.
pub async fn execute_reconciliation(
    domain: &dyn AccessDomain,
    plan: &ReconciliationPlan,
    dry_run: bool,
) -> Result<ReconciliationResult, SyncError> {
    let mut result = ReconciliationResult::default();
    let name = domain.name();

    for change in &plan.skipped {
        warn!(domain = name, entity = %change.name, reason = domain.skip_reason(), "Skipping entity");
        result.skip(&change.name, domain.skip_reason());
    }

    for change in &plan.to_create {
        if dry_run {
            info!(domain = name, entity = %change.name, add = ?change.add, "Would create");
            result.skip(&change.name, DRY_RUN);
            continue;
        }
        match domain.create(change).await? {
            ApplyOutcome::Applied => {
                info!(domain = name, entity = %change.name, "Created");
                result.created.push(change.name.clone());
            }
            ApplyOutcome::Skipped(reason) => {
                warn!(domain = name, entity = %change.name, %reason, "Skipping entity");
                result.skip(&change.name, reason);
            }
        }
    }

    for change in &plan.to_update {
        if dry_run {
            info!(domain = name, entity = %change.name, add = ?change.add, "Would update");
            result.skip(&change.name, DRY_RUN);
            continue;
        }
        match domain.update(change).await? {
            ApplyOutcome::Applied => {
                info!(domain = name, entity = %change.name, add = ?change.add, "Updated");
                result.updated.push(change.name.clone());
            }
            ApplyOutcome::Skipped(reason) => {
                warn!(domain = name, entity = %change.name, %reason, "Skipping entity");
                result.skip(&change.name, reason);
            }
        }
    }

    result.unchanged = plan.up_to_date.iter().map(|c| c.name.clone()).collect();
    Ok(result)
}
