//! Group entitlements and the workspace-admin permission.
//!
//! Each CSV row switches flags `ON` or `OFF` for one group. Flags are only
//! ever added: a flag that is `OFF` in the CSV but granted remotely is left
//! in place and reported by validation.

use crate::config::DomainPaths;
use crate::databricks::{principal_id, AccountApi, ApiError, WorkspaceApi, WorkspacePermission};
use crate::groups::workspace_groups;
use crate::reconciliation::{AccessDomain, ApplyOutcome, EntityChange, MissingEntityPolicy, SyncError};
use crate::state::{ComparisonMode, EntityState, StateMap};
use crate::table::{read_table, TableError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const GROUP_COLUMN: &str = "group";

/// Granted through an `ADMIN` workspace assignment rather than SCIM
pub const WORKSPACE_ADMIN: &str = "workspace_admin";

/// CSV column → SCIM entitlement value
const ENTITLEMENT_ALIASES: &[(&str, &str)] = &[
    ("workspace_access", "workspace-access"),
    ("sql_access", "databricks-sql-access"),
    ("cluster_create", "allow-cluster-create"),
];

const FLAG_COLUMNS: &[&str] = &[WORKSPACE_ADMIN, "workspace_access", "sql_access", "cluster_create"];

pub const COLUMNS: &[&str] = &[
    GROUP_COLUMN,
    WORKSPACE_ADMIN,
    "workspace_access",
    "sql_access",
    "cluster_create",
];

/// SCIM value for a CSV alias
pub fn api_value(alias: &str) -> Option<&'static str> {
    ENTITLEMENT_ALIASES
        .iter()
        .find(|(a, _)| *a == alias)
        .map(|(_, v)| *v)
}

/// CSV alias for a SCIM value
pub fn alias_for(value: &str) -> Option<&'static str> {
    ENTITLEMENT_ALIASES
        .iter()
        .find(|(_, v)| v.eq_ignore_ascii_case(value.trim()))
        .map(|(a, _)| *a)
}

fn flag_cell(value: bool) -> String {
    let cell = if value { "ON" } else { "OFF" };
    cell.to_string()
}

/// Load desired entitlements from the entitlements CSV
pub async fn load_entitlements(path: &Path) -> Result<StateMap, TableError> {
    let table = read_table(path, COLUMNS).await?;
    let mut state = StateMap::new();

    for row in table.rows() {
        let Some(group) = row.get(GROUP_COLUMN) else {
            continue;
        };

        let mut flags = Vec::new();
        for column in FLAG_COLUMNS {
            match row.get(column) {
                Some(v) if v.eq_ignore_ascii_case("ON") => flags.push(*column),
                None => {}
                Some(v) if v.eq_ignore_ascii_case("OFF") => {}
                Some(v) => {
                    warn!(group, column = *column, value = v, row = row.number, "Treating value as OFF");
                }
            }
        }

        if state.insert(EntityState::new(group).with_attributes(flags)) {
            warn!(group, row = row.number, "Duplicate group in CSV; flags merged");
        }
    }

    Ok(state)
}

pub struct EntitlementsDomain {
    workspace: Arc<dyn WorkspaceApi>,
    account: Arc<dyn AccountApi>,
    paths: DomainPaths,
    excluded_groups: Vec<String>,
    workspace_id: OnceCell<u64>,
}

impl EntitlementsDomain {
    pub fn new(
        workspace: Arc<dyn WorkspaceApi>,
        account: Arc<dyn AccountApi>,
        paths: DomainPaths,
        excluded_groups: Vec<String>,
    ) -> Self {
        Self {
            workspace,
            account,
            paths,
            excluded_groups,
            workspace_id: OnceCell::new(),
        }
    }

    async fn workspace_id(&self) -> Result<u64, ApiError> {
        self.workspace_id
            .get_or_try_init(|| self.workspace.workspace_id())
            .await
            .copied()
    }

    /// Principal ids holding `ADMIN` on the workspace
    async fn admin_principals(&self) -> Result<HashSet<u64>, ApiError> {
        let assignments = self
            .account
            .list_permission_assignments(self.workspace_id().await?)
            .await?;
        Ok(assignments
            .into_iter()
            .filter(|a| a.is_admin())
            .map(|a| a.principal.principal_id)
            .collect())
    }
}

#[async_trait]
impl AccessDomain for EntitlementsDomain {
    fn name(&self) -> &'static str {
        "entitlements"
    }

    fn paths(&self) -> &DomainPaths {
        &self.paths
    }

    fn comparison_mode(&self) -> ComparisonMode {
        ComparisonMode::Attributes
    }

    fn missing_policy(&self) -> MissingEntityPolicy {
        MissingEntityPolicy::Skip
    }

    fn skip_reason(&self) -> &'static str {
        "group is not assigned to the workspace"
    }

    fn export_headers(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn export_row(&self, entity: &EntityState) -> Vec<String> {
        let mut row = vec![entity.name.clone()];
        row.extend(
            FLAG_COLUMNS
                .iter()
                .map(|column| flag_cell(entity.attributes.contains(*column))),
        );
        row
    }

    async fn load_desired(&self) -> Result<StateMap, SyncError> {
        Ok(load_entitlements(&self.paths.input).await?)
    }

    async fn read_remote(&self) -> Result<StateMap, SyncError> {
        let groups = workspace_groups(self.workspace.as_ref(), &self.excluded_groups).await?;
        let admins = self.admin_principals().await?;

        let mut state = StateMap::new();
        for group in groups {
            let mut flags: Vec<&str> = Vec::new();
            for value in group.entitlement_values() {
                match alias_for(value) {
                    Some(alias) => flags.push(alias),
                    None => debug!(group = %group.display_name, value, "Ignoring entitlement"),
                }
            }
            if group.id.parse::<u64>().is_ok_and(|id| admins.contains(&id)) {
                flags.push(WORKSPACE_ADMIN);
            }

            state.insert(
                EntityState::new(group.display_name.as_str())
                    .with_id(group.id.as_str())
                    .with_attributes(flags),
            );
        }
        Ok(state)
    }

    async fn create(&self, _change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        Ok(ApplyOutcome::Skipped(self.skip_reason().to_string()))
    }

    async fn update(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        let Some(group_id) = change.id.as_deref() else {
            return Ok(ApplyOutcome::Skipped("group id is unknown".into()));
        };

        if change.add.contains(WORKSPACE_ADMIN) {
            let workspace_id = self.workspace_id().await?;
            self.account
                .update_permission_assignment(
                    workspace_id,
                    principal_id(group_id)?,
                    &[WorkspacePermission::Admin],
                )
                .await?;
        }

        let values: Vec<String> = change
            .add
            .iter()
            .filter_map(|alias| api_value(alias))
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            self.workspace.add_group_entitlements(group_id, &values).await?;
        }

        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databricks::mock::MockDatabricks;
    use std::collections::BTreeSet;
    use tempfile::TempDir;
    use tokio::fs;

    const HEADER: &str = "group,workspace_admin,workspace_access,sql_access,cluster_create\n";

    fn domain(mock: Arc<MockDatabricks>, dir: &Path) -> EntitlementsDomain {
        EntitlementsDomain::new(
            mock.clone(),
            mock,
            DomainPaths {
                input: dir.join("entitlements.csv"),
                output: dir.join("out/entitlements.csv"),
            },
            vec!["users".into(), "admins".into()],
        )
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_alias_mapping_both_ways() {
        assert_eq!(api_value("sql_access"), Some("databricks-sql-access"));
        assert_eq!(alias_for("allow-cluster-create"), Some("cluster_create"));
        assert_eq!(alias_for("allow-instance-pool-create"), None);
        assert_eq!(api_value(WORKSPACE_ADMIN), None);
    }

    #[tokio::test]
    async fn test_load_reads_on_flags_case_insensitively() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("entitlements.csv");
        let content = format!("{HEADER}Analysts,off,On,ON,\nops,ON,OFF,yes,OFF\n");
        fs::write(&path, content).await.unwrap();

        let state = load_entitlements(&path).await.unwrap();
        assert_eq!(state.attributes_of("analysts"), set(&["sql_access", "workspace_access"]));
        assert_eq!(state.attributes_of("ops"), set(&["workspace_admin"]));
    }

    #[tokio::test]
    async fn test_load_requires_every_flag_column() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("entitlements.csv");
        fs::write(&path, "group,sql_access\nops,ON\n").await.unwrap();

        let err = load_entitlements(&path).await.unwrap_err();
        assert!(matches!(err, TableError::MissingColumns { ref missing, .. } if missing.len() == 3));
    }

    #[tokio::test]
    async fn test_read_remote_maps_entitlements_and_admin() {
        let temp = TempDir::new().unwrap();
        let mock = Arc::new(
            MockDatabricks::new(5)
                .with_workspace_group("10", "ops", &["allow-cluster-create", "some-future-value"])
                .with_workspace_group("11", "analysts", &[])
                .with_admin("11"),
        );

        let state = domain(mock, temp.path()).read_remote().await.unwrap();
        assert_eq!(state.attributes_of("ops"), set(&["cluster_create"]));
        assert_eq!(state.attributes_of("analysts"), set(&["workspace_admin"]));
    }

    #[tokio::test]
    async fn test_update_grants_admin_and_missing_entitlements() {
        let temp = TempDir::new().unwrap();
        let mock = Arc::new(MockDatabricks::new(5).with_workspace_group("10", "ops", &["workspace-access"]));
        let domain = domain(mock.clone(), temp.path());

        let change = EntityChange {
            key: "ops".into(),
            name: "ops".into(),
            id: Some("10".into()),
            add: set(&["workspace_admin", "sql_access"]),
            extra: BTreeSet::new(),
        };
        assert_eq!(domain.update(&change).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(
            mock.write_calls().await,
            vec![
                "assign 10 ADMIN".to_string(),
                "entitlements 10 +databricks-sql-access".to_string()
            ]
        );
    }

    #[test]
    fn test_export_row_uses_on_off() {
        let mock = Arc::new(MockDatabricks::new(1));
        let domain = domain(mock, Path::new("."));
        let entity = EntityState::new("Ops").with_attributes(["sql_access", "workspace_admin"]);
        assert_eq!(domain.export_row(&entity), vec!["Ops", "ON", "OFF", "ON", "OFF"]);
    }
}
