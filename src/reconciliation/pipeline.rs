use super::execute::{execute_reconciliation, AccessDomain, ReconciliationResult, SyncError};
use super::plan::{build_reconciliation_plan, ReconciliationPlan};
use crate::report::{
    create_report, report_path, write_report, ExportedFile, PlanSummary, RunAction, Validation,
};
use crate::state::{diff_states, StateMap};
use crate::table::write_table;
use crate::utils::{compute_hash, now_iso};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Plan and report without sending any change
    pub dry_run: bool,
}

/// Everything a sync run did
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub plan: ReconciliationPlan,
    pub result: ReconciliationResult,
    pub export: ExportedFile,
    pub validation: Validation,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub export: ExportedFile,
    pub report_path: PathBuf,
}

/// Load, read, plan, apply, export, validate and write the run report.
pub async fn run_sync(
    domain: &dyn AccessDomain,
    options: SyncOptions,
) -> Result<SyncOutcome, SyncError> {
    let name = domain.name();
    let mut report = create_report(name, RunAction::Sync, options.dry_run, now_iso());

    let desired = domain.load_desired().await?;
    info!(domain = name, entities = desired.len(), "Loaded desired state");

    let actual = domain.read_remote().await?;
    info!(domain = name, entities = actual.len(), "Read remote state");

    let plan = build_reconciliation_plan(&desired, &actual, domain.missing_policy());
    let summary = PlanSummary::from(&plan);
    info!(
        domain = name,
        to_create = summary.to_create,
        to_update = summary.to_update,
        up_to_date = summary.up_to_date,
        skipped = summary.skipped,
        remote_only = summary.remote_only,
        "Built reconciliation plan"
    );
    for entity in &plan.remote_only {
        debug!(domain = name, entity = %entity, "Present remotely but not in CSV");
    }

    let result = execute_reconciliation(domain, &plan, options.dry_run).await?;

    let after = if plan.needs_changes() && !options.dry_run {
        domain.read_remote().await?
    } else {
        actual
    };
    let export = export_state(domain, &after).await?;

    // Validate against a fresh read of the CSV, as a stand-alone validate would
    let validation = validate(domain, &domain.load_desired().await?, &after);

    report.plan = Some(summary);
    report.result = Some(result.clone());
    report.export = Some(export.clone());
    report.validation = Some(validation.clone());
    let report_path = report_path(&domain.paths().output, name);
    write_report(&report_path, &mut report).await?;

    Ok(SyncOutcome {
        plan,
        result,
        export,
        validation,
        report_path,
    })
}

/// Export the remote state to the domain's output CSV and write the run report.
pub async fn run_export(domain: &dyn AccessDomain) -> Result<ExportOutcome, SyncError> {
    let name = domain.name();
    let mut report = create_report(name, RunAction::Export, false, now_iso());

    let actual = domain.read_remote().await?;
    let export = export_state(domain, &actual).await?;

    report.export = Some(export.clone());
    let report_path = report_path(&domain.paths().output, name);
    write_report(&report_path, &mut report).await?;

    Ok(ExportOutcome {
        export,
        report_path,
    })
}

/// Compare the CSV with the remote state without changing anything.
pub async fn run_validate(domain: &dyn AccessDomain) -> Result<Validation, SyncError> {
    let desired = domain.load_desired().await?;
    let actual = domain.read_remote().await?;
    Ok(validate(domain, &desired, &actual))
}

fn validate(domain: &dyn AccessDomain, desired: &StateMap, actual: &StateMap) -> Validation {
    let mode = domain.comparison_mode();
    let diff = diff_states(desired, actual);
    let matched = diff.matches(mode);

    if matched {
        info!(domain = domain.name(), "CSV and remote state match");
    } else {
        warn!(
            domain = domain.name(),
            missing = ?diff.missing_entities,
            unexpected = ?diff.unexpected_entities,
            "CSV and remote state differ"
        );
        for entity in &diff.entities {
            warn!(
                domain = domain.name(),
                entity = %entity.name,
                only_csv = ?entity.only_csv,
                only_remote = ?entity.only_remote,
                "Attribute mismatch"
            );
        }
    }

    Validation {
        mode,
        matched,
        diff,
    }
}

async fn export_state(domain: &dyn AccessDomain, state: &StateMap) -> Result<ExportedFile, SyncError> {
    let path = &domain.paths().output;
    let rows = state.iter().map(|(_, entity)| domain.export_row(entity));
    let content = write_table(path, domain.export_headers(), rows).await?;

    info!(domain = domain.name(), path = %path.display(), rows = state.len(), "Exported remote state");
    Ok(ExportedFile {
        path: path.clone(),
        sha256: compute_hash(&content),
        rows: state.len(),
    })
}
