#![allow(dead_code)]

use dbx_access_sync::DomainPaths;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Input and output paths for a domain inside `dir`
pub fn domain_paths(dir: &Path, name: &str) -> DomainPaths {
    DomainPaths {
        input: dir.join("inputfolder").join(format!("{name}.csv")),
        output: dir.join("outputfolder").join(format!("{name}_result.csv")),
    }
}

/// Write the input CSV of `paths`
pub async fn write_input(paths: &DomainPaths, content: &str) -> PathBuf {
    if let Some(parent) = paths.input.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .expect("Failed to create input dir");
    }
    tokio::fs::write(&paths.input, content)
        .await
        .expect("Failed to write input CSV");
    paths.input.clone()
}

pub async fn read_output(paths: &DomainPaths) -> String {
    tokio::fs::read_to_string(&paths.output)
        .await
        .expect("Failed to read exported CSV")
}

/// Parse the run report written next to the export
pub async fn read_report(paths: &DomainPaths, domain: &str) -> serde_json::Value {
    let path = dbx_access_sync::report::report_path(&paths.output, domain);
    let content = tokio::fs::read_to_string(&path)
        .await
        .expect("Failed to read report");
    serde_json::from_str(&content).expect("Report is not valid JSON")
}

pub fn default_groups() -> Vec<String> {
    vec!["users".to_string(), "admins".to_string()]
}
