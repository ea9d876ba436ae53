pub mod assignments;
pub mod config;
pub mod databricks;
pub mod entitlements;
pub mod groups;
pub mod ip_access;
pub mod reconciliation;
pub mod report;
pub mod state;
pub mod table;
pub mod utils;

// Re-export commonly used types
pub use config::{read_config, ConfigError, DomainPaths, SyncConfig};
pub use entitlements::EntitlementsDomain;
pub use groups::GroupsDomain;
pub use ip_access::IpAccessDomain;
pub use reconciliation::{
    build_reconciliation_plan, execute_reconciliation, run_export, run_sync, run_validate,
    AccessDomain, ReconciliationPlan, ReconciliationResult, SyncError, SyncOptions, SyncOutcome,
};
pub use report::{ExportedFile, RunReport, Validation};
pub use state::{diff_states, normalize, ComparisonMode, EntityState, StateDiff, StateMap};
pub use table::TableError;
