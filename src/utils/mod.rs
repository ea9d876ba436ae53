mod hash;

pub use hash::compute_hash;

/// Current tool version, recorded in run reports
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "access-sync.json";

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
