use crate::databricks::ListType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Input CSV and export CSV of one domain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainPaths {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl DomainPaths {
    fn new(input: &str, output: &str) -> Self {
        Self {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
        }
    }

    fn resolve(&mut self, base: &Path) {
        if self.input.is_relative() {
            self.input = base.join(&self.input);
        }
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
    }
}

fn default_groups() -> DomainPaths {
    DomainPaths::new("inputfolder/groups.csv", "outputfolder/result_workspace_groups.csv")
}

fn default_entitlements() -> DomainPaths {
    DomainPaths::new(
        "inputfolder/groups_entitlement.csv",
        "outputfolder/result_groups_entitlements.csv",
    )
}

fn default_ip_lists() -> DomainPaths {
    DomainPaths::new(
        "inputfolder/ip_address_list.csv",
        "outputfolder/get_ip_address_list_result.csv",
    )
}

/// Groups every workspace has; never synced or exported
fn default_excluded_groups() -> Vec<String> {
    vec!["users".to_string(), "admins".to_string()]
}

fn default_strict() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

/// Sync configuration, read from `access-sync.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default = "default_groups")]
    pub groups: DomainPaths,
    #[serde(default = "default_entitlements")]
    pub entitlements: DomainPaths,
    #[serde(default = "default_ip_lists")]
    pub ip_lists: DomainPaths,
    #[serde(default = "default_excluded_groups")]
    pub excluded_groups: Vec<String>,
    /// Type of IP access lists created by the sync
    #[serde(default)]
    pub ip_list_type: ListType,
    /// Fail the run when validation finds a mismatch
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            groups: default_groups(),
            entitlements: default_entitlements(),
            ip_lists: default_ip_lists(),
            excluded_groups: default_excluded_groups(),
            ip_list_type: ListType::default(),
            strict: default_strict(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SyncConfig {
    /// Strictness of this run; `--non-strict` overrides the file
    pub fn strict_run(&self, non_strict: bool) -> bool {
        self.strict && !non_strict
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeoutSecs must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Read the configuration file.
///
/// A missing file yields the defaults. Relative paths in the file are
/// resolved against the directory that contains it.
pub async fn read_config(config_path: &Path) -> Result<SyncConfig, ConfigError> {
    if !config_path.exists() {
        return Ok(SyncConfig::default());
    }

    let content = fs::read_to_string(config_path).await?;
    let mut config: SyncConfig = serde_json::from_str(&content)?;
    config.validate()?;

    if let Some(base) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.groups.resolve(base);
        config.entitlements.resolve(base);
        config.ip_lists.resolve(base);
    }
    Ok(config)
}
