//! JSON run reports written next to each export.

mod types;

pub use types::{ExportedFile, PlanSummary, RunAction, RunReport, Validation};

use crate::utils::{now_iso, TOOL_VERSION};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Create an empty report for a run that started at `started_at`
pub fn create_report(domain: &str, action: RunAction, dry_run: bool, started_at: String) -> RunReport {
    RunReport {
        schema_version: 1,
        tool_version: TOOL_VERSION.to_string(),
        domain: domain.to_string(),
        action,
        dry_run,
        started_at,
        finished_at: String::new(),
        plan: None,
        result: None,
        export: None,
        validation: None,
    }
}

/// `<domain>-report.json` in the directory of the export file
pub fn report_path(export_path: &Path, domain: &str) -> PathBuf {
    let file_name = format!("{}-report.json", domain);
    match export_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Stamp the finish time and write the report, overwriting any previous one
pub async fn write_report(path: &Path, report: &mut RunReport) -> Result<(), ReportError> {
    report.finished_at = now_iso();
    let content = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_path_sits_next_to_export() {
        assert_eq!(
            report_path(Path::new("out/result_workspace_groups.csv"), "groups"),
            PathBuf::from("out/groups-report.json")
        );
    }

    #[tokio::test]
    async fn test_write_report_sets_finish_time() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/ip-lists-report.json");
        let mut report = create_report("ip-lists", RunAction::Export, false, now_iso());
        report.export = Some(ExportedFile {
            path: temp.path().join("ips.csv"),
            sha256: "abc".into(),
            rows: 2,
        });

        write_report(&path, &mut report).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(value["domain"], "ip-lists");
        assert_eq!(value["action"], "export");
        assert_eq!(value["export"]["rows"], 2);
        assert!(value.get("plan").is_none());
        assert!(!report.finished_at.is_empty());
    }
}
