use crate::databricks::WorkspaceApi;
use crate::reconciliation::SyncError;
use std::collections::HashMap;
use tracing::info;

/// Workspace-conf key that turns IP access list enforcement on
pub const IP_ACCESS_LISTS_KEY: &str = "enableIpAccessLists";

/// Whether IP access lists are enforced; an unset key means disabled
pub async fn ip_access_enabled(workspace: &dyn WorkspaceApi) -> Result<bool, SyncError> {
    let conf = workspace.get_workspace_conf(&[IP_ACCESS_LISTS_KEY]).await?;
    Ok(conf
        .get(IP_ACCESS_LISTS_KEY)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
}

/// Turn enforcement on or off, then read the setting back to confirm it
pub async fn set_ip_access_enabled(
    workspace: &dyn WorkspaceApi,
    enabled: bool,
) -> Result<(), SyncError> {
    let conf = HashMap::from([(IP_ACCESS_LISTS_KEY.to_string(), enabled.to_string())]);
    workspace.set_workspace_conf(&conf).await?;

    let actual = ip_access_enabled(workspace).await?;
    if actual != enabled {
        return Err(SyncError::SettingNotApplied {
            key: IP_ACCESS_LISTS_KEY.to_string(),
            expected: enabled.to_string(),
            actual: actual.to_string(),
        });
    }

    info!(key = IP_ACCESS_LISTS_KEY, enabled, "Updated workspace setting");
    Ok(())
}
