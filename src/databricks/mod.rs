//! Databricks management API access.
//!
//! The reconciliation code only talks to the [`WorkspaceApi`] and
//! [`AccountApi`] traits. [`WorkspaceClient`] and [`AccountClient`] implement
//! them over REST; [`mock::MockDatabricks`] implements both in memory.

mod account;
mod error;
mod http;
pub mod mock;
mod scim;
mod types;
mod workspace;

pub use account::AccountClient;
pub use error::{ApiError, ApiResult};
pub use http::{AuthConfig, HttpClient};
pub use scim::SCIM_PAGE_SIZE;
pub use types::{
    ComplexValue, CreateIpAccessList, Group, IpAccessList, ListType, PermissionAssignment,
    Principal, UpdateIpAccessList, WorkspacePermission,
};
pub use workspace::WorkspaceClient;

use async_trait::async_trait;
use std::collections::HashMap;

/// Workspace-scoped operations
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Numeric id of the workspace
    async fn workspace_id(&self) -> ApiResult<u64>;

    /// All groups visible in the workspace, with entitlements
    async fn list_workspace_groups(&self) -> ApiResult<Vec<Group>>;

    /// Add entitlement values to a group, keeping the ones it already has
    async fn add_group_entitlements(&self, group_id: &str, entitlements: &[String]) -> ApiResult<()>;

    async fn list_ip_access_lists(&self) -> ApiResult<Vec<IpAccessList>>;

    async fn create_ip_access_list(&self, request: &CreateIpAccessList) -> ApiResult<IpAccessList>;

    async fn update_ip_access_list(&self, list_id: &str, request: &UpdateIpAccessList) -> ApiResult<()>;

    /// Read workspace-conf keys; keys without a value are omitted
    async fn get_workspace_conf(&self, keys: &[&str]) -> ApiResult<HashMap<String, String>>;

    async fn set_workspace_conf(&self, conf: &HashMap<String, String>) -> ApiResult<()>;
}

/// Account-scoped operations
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn list_account_groups(&self) -> ApiResult<Vec<Group>>;

    async fn list_permission_assignments(
        &self,
        workspace_id: u64,
    ) -> ApiResult<Vec<PermissionAssignment>>;

    /// Set a principal's permissions on a workspace
    async fn update_permission_assignment(
        &self,
        workspace_id: u64,
        principal_id: u64,
        permissions: &[WorkspacePermission],
    ) -> ApiResult<()>;
}

/// Parse a SCIM group id into the numeric principal id used by the account API
pub fn principal_id(group_id: &str) -> ApiResult<u64> {
    group_id
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidResponse(format!("group id '{}' is not numeric", group_id)))
}
