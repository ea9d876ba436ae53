//! Read-only listing of the workspace's permission assignments.

use crate::databricks::{AccountApi, ApiError, WorkspaceApi, WorkspacePermission};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentEntry {
    pub principal_id: u64,
    pub name: String,
    pub permissions: Vec<WorkspacePermission>,
}

/// Principals assigned to the workspace, sorted by name
pub async fn list_workspace_assignments(
    workspace: &dyn WorkspaceApi,
    account: &dyn AccountApi,
) -> Result<Vec<AssignmentEntry>, ApiError> {
    let workspace_id = workspace.workspace_id().await?;
    let assignments = account.list_permission_assignments(workspace_id).await?;

    let mut entries: Vec<AssignmentEntry> = assignments
        .into_iter()
        .map(|a| {
            if let Some(error) = &a.error {
                warn!(principal_id = a.principal.principal_id, %error, "Assignment reported an error");
            }
            let name = a
                .principal
                .display_name
                .or(a.principal.group_name)
                .unwrap_or_else(|| a.principal.principal_id.to_string());
            AssignmentEntry {
                principal_id: a.principal.principal_id,
                name,
                permissions: a.permissions,
            }
        })
        .collect();

    entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databricks::mock::MockDatabricks;

    #[tokio::test]
    async fn test_lists_assignments_sorted_by_name() {
        let mock = MockDatabricks::new(3)
            .with_workspace_group("20", "ops", &[])
            .with_workspace_group("10", "Analysts", &[])
            .with_admin("20");

        let entries = list_workspace_assignments(&mock, &mock).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Analysts");
        assert_eq!(entries[1].permissions, vec![WorkspacePermission::Admin]);
    }
}
