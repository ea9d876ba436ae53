//! Workspace IP access lists keyed by label.

mod toggle;

pub use toggle::{ip_access_enabled, set_ip_access_enabled, IP_ACCESS_LISTS_KEY};

use crate::config::DomainPaths;
use crate::databricks::{CreateIpAccessList, IpAccessList, ListType, UpdateIpAccessList, WorkspaceApi};
use crate::reconciliation::{AccessDomain, ApplyOutcome, EntityChange, MissingEntityPolicy, SyncError};
use crate::state::{normalize, ComparisonMode, EntityState, StateMap};
use crate::table::{read_table, TableError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const LABEL_COLUMN: &str = "label";
pub const ADDRESS_COLUMN: &str = "ip_address";
/// Accepted in place of `ip_address`
pub const CIDR_COLUMN: &str = "cidr";

const EXPORT_HEADERS: &[&str] = &[LABEL_COLUMN, ADDRESS_COLUMN];

/// Check that `value` is an IPv4/IPv6 address with an optional prefix length
pub fn validate_cidr(value: &str) -> Result<(), String> {
    let (address, prefix) = match value.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (value, None),
    };

    let ip: IpAddr = address
        .parse()
        .map_err(|_| format!("'{}' is not an IP address", address))?;

    if let Some(prefix) = prefix {
        // u8 parsing would also take a sign
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{}' is not a prefix length", prefix));
        }
        let bits: u8 = prefix
            .parse()
            .map_err(|_| format!("'{}' is not a prefix length", prefix))?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return Err(format!("prefix /{} is longer than {} bits", bits, max));
        }
    }
    Ok(())
}

/// Load desired IP access lists from a `label,ip_address` CSV
pub async fn load_ip_lists(path: &Path) -> Result<StateMap, TableError> {
    let table = read_table(path, &[LABEL_COLUMN]).await?;
    let address_column = if table.has_column(ADDRESS_COLUMN) {
        ADDRESS_COLUMN
    } else if table.has_column(CIDR_COLUMN) {
        CIDR_COLUMN
    } else {
        return Err(TableError::MissingColumns {
            path: path.to_path_buf(),
            missing: vec![ADDRESS_COLUMN.to_string()],
        });
    };

    let mut state = StateMap::new();
    for row in table.rows() {
        let Some(label) = row.get(LABEL_COLUMN) else {
            debug!(row = row.number, "Skipping row without label");
            continue;
        };

        let addresses: Vec<&str> = row
            .get(address_column)
            .map(|cell| cell.split(',').map(str::trim).filter(|a| !a.is_empty()).collect())
            .unwrap_or_default();
        if addresses.is_empty() {
            warn!(label, row = row.number, "Skipping list without addresses");
            continue;
        }

        for address in &addresses {
            validate_cidr(address)
                .map_err(|reason| table.invalid_value(&row, address_column, address, reason))?;
        }

        if state.insert(EntityState::new(label).with_attributes(addresses)) {
            warn!(label, row = row.number, "Duplicate label in CSV; addresses merged");
        }
    }

    Ok(state)
}

/// `current` plus every address of `add` it does not already hold
fn merge_addresses(current: &[String], add: &BTreeSet<String>) -> Vec<String> {
    let known: BTreeSet<String> = current.iter().map(|a| normalize(a)).collect();
    let mut merged = current.to_vec();
    merged.extend(add.iter().filter(|a| !known.contains(*a)).cloned());
    merged
}

pub struct IpAccessDomain {
    workspace: Arc<dyn WorkspaceApi>,
    paths: DomainPaths,
    list_type: ListType,
}

impl IpAccessDomain {
    pub fn new(workspace: Arc<dyn WorkspaceApi>, paths: DomainPaths, list_type: ListType) -> Self {
        Self {
            workspace,
            paths,
            list_type,
        }
    }

    async fn find_list(&self, predicate: impl Fn(&IpAccessList) -> bool) -> Result<Option<IpAccessList>, SyncError> {
        let lists = self.workspace.list_ip_access_lists().await?;
        Ok(lists.into_iter().find(|l| predicate(l)))
    }
}

#[async_trait]
impl AccessDomain for IpAccessDomain {
    fn name(&self) -> &'static str {
        "ip-lists"
    }

    fn paths(&self) -> &DomainPaths {
        &self.paths
    }

    fn comparison_mode(&self) -> ComparisonMode {
        ComparisonMode::Attributes
    }

    fn missing_policy(&self) -> MissingEntityPolicy {
        MissingEntityPolicy::Create
    }

    fn export_headers(&self) -> &'static [&'static str] {
        EXPORT_HEADERS
    }

    fn export_row(&self, entity: &EntityState) -> Vec<String> {
        let addresses: Vec<&str> = entity.attributes.iter().map(String::as_str).collect();
        vec![entity.name.clone(), addresses.join(",")]
    }

    async fn load_desired(&self) -> Result<StateMap, SyncError> {
        Ok(load_ip_lists(&self.paths.input).await?)
    }

    /// Enabled lists only; a disabled list does not grant or block anything
    async fn read_remote(&self) -> Result<StateMap, SyncError> {
        let lists = self.workspace.list_ip_access_lists().await?;
        let mut state = StateMap::new();
        for list in lists.into_iter().filter(|l| l.enabled) {
            let label = list.label.clone();
            if state.insert(
                EntityState::new(list.label)
                    .with_id(list.list_id)
                    .with_attributes(list.ip_addresses),
            ) {
                warn!(label = %label, "Several enabled lists share this label");
            }
        }
        Ok(state)
    }

    async fn create(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        let disabled = self
            .find_list(|l| !l.enabled && normalize(&l.label) == change.key)
            .await?;

        match disabled {
            Some(list) => {
                let update = UpdateIpAccessList {
                    ip_addresses: Some(merge_addresses(&list.ip_addresses, &change.add)),
                    enabled: Some(true),
                };
                self.workspace.update_ip_access_list(&list.list_id, &update).await?;
                debug!(label = %change.name, list_id = %list.list_id, "Re-enabled list");
            }
            None => {
                let request = CreateIpAccessList {
                    label: change.name.clone(),
                    list_type: self.list_type,
                    ip_addresses: change.add.iter().cloned().collect(),
                };
                let created = self.workspace.create_ip_access_list(&request).await?;
                debug!(label = %created.label, list_id = %created.list_id, "Created list");
            }
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn update(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        let Some(list_id) = change.id.as_deref() else {
            return Ok(ApplyOutcome::Skipped("list id is unknown".into()));
        };
        let Some(list) = self.find_list(|l| l.list_id == list_id).await? else {
            return Ok(ApplyOutcome::Skipped("list no longer exists".into()));
        };

        let update = UpdateIpAccessList {
            ip_addresses: Some(merge_addresses(&list.ip_addresses, &change.add)),
            enabled: None,
        };
        self.workspace.update_ip_access_list(list_id, &update).await?;
        Ok(ApplyOutcome::Applied)
    }
}
