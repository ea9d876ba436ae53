mod execute;
mod pipeline;
mod plan;

pub use execute::{
    execute_reconciliation, AccessDomain, ApplyOutcome, ReconciliationResult, SkippedEntity,
    SyncError, DRY_RUN,
};
pub use pipeline::{run_export, run_sync, run_validate, ExportOutcome, SyncOptions, SyncOutcome};
pub use plan::{build_reconciliation_plan, EntityChange, MissingEntityPolicy, ReconciliationPlan};
