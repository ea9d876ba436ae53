//! Workspace group assignment.
//!
//! The CSV lists account groups that must be assigned to the workspace. A
//! missing group is assigned with the `USER` permission when the account
//! knows it; groups are never unassigned.

use crate::config::DomainPaths;
use crate::databricks::{principal_id, AccountApi, ApiError, Group, WorkspaceApi, WorkspacePermission};
use crate::reconciliation::{AccessDomain, ApplyOutcome, EntityChange, MissingEntityPolicy, SyncError};
use crate::state::{normalize, ComparisonMode, EntityState, StateMap};
use crate::table::{read_table, TableError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const GROUP_COLUMN: &str = "group_physical_name";

const EXPORT_HEADERS: &[&str] = &[GROUP_COLUMN];

/// Whether `name` is one of the excluded default groups
pub fn is_excluded(name: &str, excluded_groups: &[String]) -> bool {
    let key = normalize(name);
    excluded_groups.iter().any(|g| normalize(g) == key)
}

/// Load the desired groups from a `group_physical_name` CSV
pub async fn load_groups(path: &Path) -> Result<StateMap, TableError> {
    let table = read_table(path, &[GROUP_COLUMN]).await?;
    let mut state = StateMap::new();

    for row in table.rows() {
        let Some(name) = row.get(GROUP_COLUMN) else {
            continue;
        };
        if state.insert(EntityState::new(name)) {
            warn!(group = name, row = row.number, "Duplicate group in CSV");
        }
    }

    Ok(state)
}

/// Workspace groups other than the excluded defaults
pub async fn workspace_groups(
    workspace: &dyn WorkspaceApi,
    excluded_groups: &[String],
) -> Result<Vec<Group>, ApiError> {
    let groups = workspace.list_workspace_groups().await?;
    Ok(groups
        .into_iter()
        .filter(|g| !is_excluded(&g.display_name, excluded_groups))
        .collect())
}

pub struct GroupsDomain {
    workspace: Arc<dyn WorkspaceApi>,
    account: Arc<dyn AccountApi>,
    paths: DomainPaths,
    excluded_groups: Vec<String>,
    workspace_id: OnceCell<u64>,
    account_groups: OnceCell<HashMap<String, Group>>,
    assigned: OnceCell<HashSet<u64>>,
}

impl GroupsDomain {
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
            account_groups: OnceCell::new(),
            assigned: OnceCell::new(),
        }
    }

    async fn workspace_id(&self) -> Result<u64, ApiError> {
        self.workspace_id
            .get_or_try_init(|| self.workspace.workspace_id())
            .await
            .copied()
    }

    /// Account groups keyed by normalized display name
    async fn account_groups(&self) -> Result<&HashMap<String, Group>, ApiError> {
        self.account_groups
            .get_or_try_init(|| async {
                let groups = self.account.list_account_groups().await?;
                debug!(count = groups.len(), "Indexed account groups");
                Ok::<_, ApiError>(groups
                    .into_iter()
                    .map(|g| (normalize(&g.display_name), g))
                    .collect())
            })
            .await
    }

    /// Principals that already hold any permission on the workspace
    async fn assigned_principals(&self) -> Result<&HashSet<u64>, ApiError> {
        let workspace_id = self.workspace_id().await?;
        self.assigned
            .get_or_try_init(|| async {
                let assignments = self.account.list_permission_assignments(workspace_id).await?;
                Ok::<_, ApiError>(assignments
                    .into_iter()
                    .map(|a| a.principal.principal_id)
                    .collect())
            })
            .await
    }
}

#[async_trait]
impl AccessDomain for GroupsDomain {
    fn name(&self) -> &'static str {
        "groups"
    }

    fn paths(&self) -> &DomainPaths {
        &self.paths
    }

    fn comparison_mode(&self) -> ComparisonMode {
        ComparisonMode::Presence
    }

    fn missing_policy(&self) -> MissingEntityPolicy {
        MissingEntityPolicy::Create
    }

    fn export_headers(&self) -> &'static [&'static str] {
        EXPORT_HEADERS
    }

    fn export_row(&self, entity: &EntityState) -> Vec<String> {
        vec![entity.name.clone()]
    }

    async fn load_desired(&self) -> Result<StateMap, SyncError> {
        Ok(load_groups(&self.paths.input).await?)
    }

    async fn read_remote(&self) -> Result<StateMap, SyncError> {
        let groups = workspace_groups(self.workspace.as_ref(), &self.excluded_groups).await?;
        Ok(groups
            .into_iter()
            .map(|g| EntityState::new(g.display_name).with_id(g.id))
            .collect())
    }

    async fn create(&self, change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        let Some(group) = self.account_groups().await?.get(&change.key) else {
            return Ok(ApplyOutcome::Skipped("group does not exist in the account".into()));
        };

        let principal = principal_id(&group.id)?;
        if self.assigned_principals().await?.contains(&principal) {
            return Ok(ApplyOutcome::Skipped("group is already assigned to the workspace".into()));
        }

        let workspace_id = self.workspace_id().await?;
        self.account
            .update_permission_assignment(workspace_id, principal, &[WorkspacePermission::User])
            .await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn update(&self, _change: &EntityChange) -> Result<ApplyOutcome, SyncError> {
        Ok(ApplyOutcome::Skipped("groups carry no attributes".into()))
    }
}
