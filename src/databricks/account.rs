use super::error::ApiResult;
use super::http::{AuthConfig, HttpClient};
use super::scim;
use super::types::{Group, PermissionAssignment, WorkspacePermission};
use super::AccountApi;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct PermissionAssignmentsResponse {
    #[serde(default)]
    permission_assignments: Vec<PermissionAssignment>,
}

#[derive(Serialize)]
struct UpdatePermissionsRequest<'a> {
    permissions: &'a [WorkspacePermission],
}

/// REST client for the Databricks account console
#[derive(Debug)]
pub struct AccountClient {
    http: HttpClient,
    account_id: String,
}

impl AccountClient {
    pub fn new(
        host: &str,
        account_id: impl Into<String>,
        auth: AuthConfig,
        timeout: Duration,
    ) -> ApiResult<Self> {
        Ok(Self {
            http: HttpClient::new(host, auth, timeout)?,
            account_id: account_id.into(),
        })
    }

    /// Token endpoint for OAuth M2M against the account console
    pub fn token_url(host: &str, account_id: &str) -> String {
        format!(
            "{}/oidc/accounts/{}/v1/token",
            host.trim_end_matches('/'),
            account_id
        )
    }

    fn account_path(&self, suffix: &str) -> String {
        format!("/api/2.0/accounts/{}/{}", self.account_id, suffix)
    }

    fn assignments_path(&self, workspace_id: u64) -> String {
        self.account_path(&format!("workspaces/{}/permissionassignments", workspace_id))
    }
}

#[async_trait]
impl AccountApi for AccountClient {
    async fn list_account_groups(&self) -> ApiResult<Vec<Group>> {
        let path = self.account_path("scim/v2/Groups");
        let groups = scim::list_groups(&self.http, &path, "id,displayName").await?;
        debug!(count = groups.len(), "Listed account groups");
        Ok(groups)
    }

    async fn list_permission_assignments(
        &self,
        workspace_id: u64,
    ) -> ApiResult<Vec<PermissionAssignment>> {
        let response: PermissionAssignmentsResponse = self
            .http
            .get_json(&self.assignments_path(workspace_id), &[])
            .await?;
        Ok(response.permission_assignments)
    }

    async fn update_permission_assignment(
        &self,
        workspace_id: u64,
        principal_id: u64,
        permissions: &[WorkspacePermission],
    ) -> ApiResult<()> {
        let path = format!(
            "{}/principals/{}",
            self.assignments_path(workspace_id),
            principal_id
        );
        self.http
            .put(&path, &UpdatePermissionsRequest { permissions })
            .await
    }
}
