//! In-memory Databricks used by tests and dry runs of the pipeline.
//!
//! Mirrors the server-side behavior the sync relies on: assigning an account
//! group to the workspace makes it show up as a workspace group, entitlement
//! patches merge, and every mutating call is recorded.

use super::error::{ApiError, ApiResult};
use super::types::{
    ComplexValue, CreateIpAccessList, Group, IpAccessList, PermissionAssignment, Principal,
    UpdateIpAccessList, WorkspacePermission,
};
use super::{principal_id, AccountApi, WorkspaceApi};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub workspace_id: u64,
    pub account_groups: Vec<Group>,
    pub workspace_groups: Vec<Group>,
    pub assignments: Vec<PermissionAssignment>,
    pub ip_access_lists: Vec<IpAccessList>,
    pub workspace_conf: HashMap<String, String>,
    /// Mutating calls in order, e.g. `assign 12 USER`
    pub write_calls: Vec<String>,
    next_list_id: u64,
}

#[derive(Debug, Default)]
pub struct MockDatabricks {
    state: Mutex<MockState>,
}

impl MockDatabricks {
    pub fn new(workspace_id: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                workspace_id,
                ..Default::default()
            }),
        }
    }

    /// Group that exists in the account but is not assigned to the workspace
    pub fn with_account_group(mut self, id: &str, name: &str) -> Self {
        self.state
            .get_mut()
            .account_groups
            .push(Group::new(id, name));
        self
    }

    /// Group that exists in the account and is assigned to the workspace as USER
    pub fn with_workspace_group(mut self, id: &str, name: &str, entitlements: &[&str]) -> Self {
        let state = self.state.get_mut();
        state.account_groups.push(Group::new(id, name));
        state
            .workspace_groups
            .push(Group::new(id, name).with_entitlements(entitlements.iter().copied()));
        if let Ok(pid) = principal_id(id) {
            state.assignments.push(assignment(pid, name, WorkspacePermission::User));
        }
        self
    }

    /// Workspace-local group such as `users` or `admins`
    pub fn with_builtin_group(mut self, id: &str, name: &str) -> Self {
        self.state
            .get_mut()
            .workspace_groups
            .push(Group::new(id, name));
        self
    }

    /// Upgrade an assigned group to ADMIN
    pub fn with_admin(mut self, id: &str) -> Self {
        let state = self.state.get_mut();
        if let Ok(pid) = principal_id(id) {
            for a in state.assignments.iter_mut() {
                if a.principal.principal_id == pid {
                    a.permissions = vec![WorkspacePermission::Admin];
                }
            }
        }
        self
    }

    pub fn with_ip_access_list(mut self, label: &str, ips: &[&str], enabled: bool) -> Self {
        let state = self.state.get_mut();
        state.next_list_id += 1;
        state.ip_access_lists.push(IpAccessList {
            list_id: format!("list-{}", state.next_list_id),
            label: label.to_string(),
            ip_addresses: ips.iter().map(|s| s.to_string()).collect(),
            list_type: Default::default(),
            enabled,
        });
        self
    }

    pub fn with_workspace_conf(mut self, key: &str, value: &str) -> Self {
        self.state
            .get_mut()
            .workspace_conf
            .insert(key.to_string(), value.to_string());
        self
    }

    pub async fn snapshot(&self) -> MockState {
        self.state.lock().await.clone()
    }

    pub async fn write_calls(&self) -> Vec<String> {
        self.state.lock().await.write_calls.clone()
    }

    pub async fn clear_write_calls(&self) {
        self.state.lock().await.write_calls.clear();
    }
}

fn assignment(principal_id: u64, name: &str, permission: WorkspacePermission) -> PermissionAssignment {
    PermissionAssignment {
        principal: Principal {
            principal_id,
            display_name: Some(name.to_string()),
            group_name: Some(name.to_string()),
        },
        permissions: vec![permission],
        error: None,
    }
}

#[async_trait]
impl WorkspaceApi for MockDatabricks {
    async fn workspace_id(&self) -> ApiResult<u64> {
        Ok(self.state.lock().await.workspace_id)
    }

    async fn list_workspace_groups(&self) -> ApiResult<Vec<Group>> {
        Ok(self.state.lock().await.workspace_groups.clone())
    }

    async fn add_group_entitlements(&self, group_id: &str, entitlements: &[String]) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        state
            .write_calls
            .push(format!("entitlements {} +{}", group_id, entitlements.join(",")));

        let group = state
            .workspace_groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ApiError::NotFound(format!("Group with id {} not found", group_id)))?;
        for value in entitlements {
            if !group.entitlements.iter().any(|e| &e.value == value) {
                group.entitlements.push(ComplexValue::new(value));
            }
        }
        Ok(())
    }

    async fn list_ip_access_lists(&self) -> ApiResult<Vec<IpAccessList>> {
        Ok(self.state.lock().await.ip_access_lists.clone())
    }

    async fn create_ip_access_list(&self, request: &CreateIpAccessList) -> ApiResult<IpAccessList> {
        let mut state = self.state.lock().await;
        state.write_calls.push(format!(
            "create-list {} {}",
            request.label,
            request.ip_addresses.join(",")
        ));
        state.next_list_id += 1;
        let list = IpAccessList {
            list_id: format!("list-{}", state.next_list_id),
            label: request.label.clone(),
            ip_addresses: request.ip_addresses.clone(),
            list_type: request.list_type,
            enabled: true,
        };
        state.ip_access_lists.push(list.clone());
        Ok(list)
    }

    async fn update_ip_access_list(&self, list_id: &str, request: &UpdateIpAccessList) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        state.write_calls.push(format!("update-list {}", list_id));

        let list = state
            .ip_access_lists
            .iter_mut()
            .find(|l| l.list_id == list_id)
            .ok_or_else(|| ApiError::NotFound(format!("IP access list {} not found", list_id)))?;
        if let Some(ips) = &request.ip_addresses {
            list.ip_addresses = ips.clone();
        }
        if let Some(enabled) = request.enabled {
            list.enabled = enabled;
        }
        Ok(())
    }

    async fn get_workspace_conf(&self, keys: &[&str]) -> ApiResult<HashMap<String, String>> {
        let state = self.state.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| state.workspace_conf.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set_workspace_conf(&self, conf: &HashMap<String, String>) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        for (key, value) in conf {
            state.write_calls.push(format!("conf {}={}", key, value));
            // The service stores booleans lower-cased
            state.workspace_conf.insert(key.clone(), value.to_lowercase());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for MockDatabricks {
    async fn list_account_groups(&self) -> ApiResult<Vec<Group>> {
        Ok(self.state.lock().await.account_groups.clone())
    }

    async fn list_permission_assignments(&self, workspace_id: u64) -> ApiResult<Vec<PermissionAssignment>> {
        let state = self.state.lock().await;
        if workspace_id != state.workspace_id {
            return Err(ApiError::NotFound(format!("workspace {} not found", workspace_id)));
        }
        Ok(state.assignments.clone())
    }

    async fn update_permission_assignment(
        &self,
        workspace_id: u64,
        principal_id: u64,
        permissions: &[WorkspacePermission],
    ) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        let rendered: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        state
            .write_calls
            .push(format!("assign {} {}", principal_id, rendered.join(",")));

        if workspace_id != state.workspace_id {
            return Err(ApiError::NotFound(format!("workspace {} not found", workspace_id)));
        }

        let id = principal_id.to_string();
        let group = state
            .account_groups
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("principal {} not found", principal_id)))?;

        match state
            .assignments
            .iter_mut()
            .find(|a| a.principal.principal_id == principal_id)
        {
            Some(existing) => existing.permissions = permissions.to_vec(),
            None => {
                let mut new = assignment(principal_id, &group.display_name, WorkspacePermission::User);
                new.permissions = permissions.to_vec();
                state.assignments.push(new);
            }
        }

        if !state.workspace_groups.iter().any(|g| g.id == id) {
            state.workspace_groups.push(group);
        }
        Ok(())
    }
}
