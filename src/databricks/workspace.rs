use super::error::{ApiError, ApiResult};
use super::http::{AuthConfig, HttpClient};
use super::scim::{self, PatchRequest};
use super::types::{CreateIpAccessList, Group, IpAccessList, UpdateIpAccessList};
use super::WorkspaceApi;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const GROUPS_PATH: &str = "/api/2.0/preview/scim/v2/Groups";
const IP_ACCESS_LISTS_PATH: &str = "/api/2.0/ip-access-lists";
const WORKSPACE_CONF_PATH: &str = "/api/2.0/workspace-conf";
const ORG_ID_HEADER: &str = "x-databricks-org-id";

#[derive(Deserialize)]
struct ListIpAccessListsResponse {
    #[serde(default)]
    ip_access_lists: Vec<IpAccessList>,
}

#[derive(Deserialize)]
struct IpAccessListResponse {
    ip_access_list: IpAccessList,
}

/// REST client for a single Databricks workspace
#[derive(Debug)]
pub struct WorkspaceClient {
    http: HttpClient,
    workspace_id: Option<u64>,
}

impl WorkspaceClient {
    pub fn new(host: &str, auth: AuthConfig, timeout: Duration) -> ApiResult<Self> {
        Ok(Self {
            http: HttpClient::new(host, auth, timeout)?,
            workspace_id: None,
        })
    }

    /// Use a known workspace id instead of discovering it from the host
    pub fn with_workspace_id(mut self, workspace_id: Option<u64>) -> Self {
        self.workspace_id = workspace_id;
        self
    }

    /// Token endpoint for OAuth M2M against a workspace host
    pub fn token_url(host: &str) -> String {
        format!("{}/oidc/v1/token", host.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkspaceApi for WorkspaceClient {
    async fn workspace_id(&self) -> ApiResult<u64> {
        if let Some(id) = self.workspace_id {
            return Ok(id);
        }

        let response = self.http.get("/", &[]).await?;
        let header = response
            .headers()
            .get(ORG_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("response is missing the {} header", ORG_ID_HEADER))
            })?;

        header.trim().parse().map_err(|_| {
            ApiError::InvalidResponse(format!("invalid workspace id '{}'", header))
        })
    }

    async fn list_workspace_groups(&self) -> ApiResult<Vec<Group>> {
        let groups = scim::list_groups(&self.http, GROUPS_PATH, "id,displayName,entitlements").await?;
        debug!(count = groups.len(), "Listed workspace groups");
        Ok(groups)
    }

    async fn add_group_entitlements(&self, group_id: &str, entitlements: &[String]) -> ApiResult<()> {
        let path = format!("{}/{}", GROUPS_PATH, group_id);
        self.http
            .patch(&path, &PatchRequest::add_entitlements(entitlements))
            .await
    }

    async fn list_ip_access_lists(&self) -> ApiResult<Vec<IpAccessList>> {
        let response: ListIpAccessListsResponse =
            self.http.get_json(IP_ACCESS_LISTS_PATH, &[]).await?;
        Ok(response.ip_access_lists)
    }

    async fn create_ip_access_list(&self, request: &CreateIpAccessList) -> ApiResult<IpAccessList> {
        let response: IpAccessListResponse =
            self.http.post_json(IP_ACCESS_LISTS_PATH, request).await?;
        Ok(response.ip_access_list)
    }

    async fn update_ip_access_list(
        &self,
        list_id: &str,
        request: &UpdateIpAccessList,
    ) -> ApiResult<()> {
        let path = format!("{}/{}", IP_ACCESS_LISTS_PATH, list_id);
        self.http.patch(&path, request).await
    }

    async fn get_workspace_conf(&self, keys: &[&str]) -> ApiResult<HashMap<String, String>> {
        let query = [("keys", keys.join(","))];
        let conf: HashMap<String, Option<String>> =
            self.http.get_json(WORKSPACE_CONF_PATH, &query).await?;
        Ok(conf
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    async fn set_workspace_conf(&self, conf: &HashMap<String, String>) -> ApiResult<()> {
        self.http.patch(WORKSPACE_CONF_PATH, conf).await
    }
}
