use dbx_access_sync::databricks::{
    AccountApi, AccountClient, ApiError, AuthConfig, CreateIpAccessList, ListType,
    UpdateIpAccessList, WorkspaceApi, WorkspaceClient, WorkspacePermission, SCIM_PAGE_SIZE,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn token_client(server: &MockServer) -> WorkspaceClient {
    WorkspaceClient::new(&server.uri(), AuthConfig::Token("pat".into()), TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_oauth_token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oidc/v1/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=all-apis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "oauth-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/ip-access-lists"))
        .and(header("authorization", "Bearer oauth-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip_access_lists": [{
                "list_id": "abc",
                "label": "office",
                "ip_addresses": ["10.0.0.0/8"],
                "list_type": "ALLOW",
                "enabled": true
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = AuthConfig::OAuth {
        client_id: "sp".into(),
        client_secret: "secret".into(),
        token_url: WorkspaceClient::token_url(&server.uri()),
    };
    let client = WorkspaceClient::new(&server.uri(), auth, TIMEOUT).unwrap();

    let lists = client.list_ip_access_lists().await.unwrap();
    assert_eq!(lists[0].label, "office");
    client.list_ip_access_lists().await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_request_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oidc/v1/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client"
        })))
        .mount(&server)
        .await;

    let auth = AuthConfig::OAuth {
        client_id: "sp".into(),
        client_secret: "wrong".into(),
        token_url: WorkspaceClient::token_url(&server.uri()),
    };
    let client = WorkspaceClient::new(&server.uri(), auth, TIMEOUT).unwrap();

    assert!(matches!(
        client.list_workspace_groups().await,
        Err(ApiError::AuthenticationFailed(_))
    ));
}

#[tokio::test]
async fn test_scim_groups_are_paged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .and(query_param("startIndex", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalResults": 3,
            "startIndex": 1,
            "Resources": [
                {"id": "1", "displayName": "users"},
                {"id": "10", "displayName": "ops", "entitlements": [{"value": "workspace-access"}]}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .and(query_param("startIndex", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalResults": 3,
            "startIndex": 3,
            "Resources": [{"id": "11", "displayName": "analysts"}]
        })))
        .mount(&server)
        .await;

    let groups = token_client(&server).list_workspace_groups().await.unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.display_name.as_str()).collect();
    assert_eq!(names, vec!["users", "ops", "analysts"]);
    assert_eq!(groups[1].entitlement_values().collect::<Vec<_>>(), vec!["workspace-access"]);
}

#[tokio::test]
async fn test_scim_paging_without_total_stops_on_short_page() {
    let server = MockServer::start().await;

    let full_page: Vec<_> = (0..SCIM_PAGE_SIZE)
        .map(|i| json!({"id": format!("{}", 100 + i), "displayName": format!("team-{i}")}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .and(query_param("startIndex", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Resources": full_page })))
        .expect(1)
        .mount(&server)
        .await;

    let next_index = (SCIM_PAGE_SIZE + 1).to_string();
    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .and(query_param("startIndex", next_index.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Resources": [{"id": "999", "displayName": "late-team"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let groups = token_client(&server).list_workspace_groups().await.unwrap();
    assert_eq!(groups.len(), SCIM_PAGE_SIZE + 1);
    assert_eq!(groups.last().map(|g| g.display_name.as_str()), Some("late-team"));
}

#[tokio::test]
async fn test_add_entitlements_sends_scim_patch() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/2.0/preview/scim/v2/Groups/10"))
        .and(body_json(json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [{
                "op": "add",
                "path": "entitlements",
                "value": [{"value": "allow-cluster-create"}]
            }]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    token_client(&server)
        .add_group_entitlements("10", &["allow-cluster-create".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_workspace_id_comes_from_org_id_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-databricks-org-id", "1234567890"))
        .mount(&server)
        .await;

    assert_eq!(token_client(&server).workspace_id().await.unwrap(), 1234567890);
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/ip-access-lists"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error_code": "PERMISSION_DENIED",
            "message": "not an admin"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/2.0/ip-access-lists/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "no such list"
        })))
        .mount(&server)
        .await;

    let client = token_client(&server);
    assert_eq!(
        client.list_ip_access_lists().await.unwrap_err(),
        ApiError::AuthorizationDenied("PERMISSION_DENIED: not an admin".into())
    );
    let update = UpdateIpAccessList {
        enabled: Some(true),
        ..Default::default()
    };
    assert!(matches!(
        client.update_ip_access_list("missing", &update).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_ip_access_list_returns_created_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/ip-access-lists"))
        .and(body_json(json!({
            "label": "vpn",
            "list_type": "ALLOW",
            "ip_addresses": ["10.8.0.0/16"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip_access_list": {
                "list_id": "new-id",
                "label": "vpn",
                "ip_addresses": ["10.8.0.0/16"],
                "list_type": "ALLOW",
                "enabled": true
            }
        })))
        .mount(&server)
        .await;

    let request = CreateIpAccessList {
        label: "vpn".into(),
        list_type: ListType::Allow,
        ip_addresses: vec!["10.8.0.0/16".into()],
    };
    let created = token_client(&server).create_ip_access_list(&request).await.unwrap();
    assert_eq!(created.list_id, "new-id");
}

#[tokio::test]
async fn test_workspace_conf_drops_unset_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace-conf"))
        .and(query_param("keys", "enableIpAccessLists,enableTokensConfig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enableIpAccessLists": "true",
            "enableTokensConfig": null
        })))
        .mount(&server)
        .await;

    let conf = token_client(&server)
        .get_workspace_conf(&["enableIpAccessLists", "enableTokensConfig"])
        .await
        .unwrap();
    assert_eq!(conf.len(), 1);
    assert_eq!(conf["enableIpAccessLists"], "true");
}

#[tokio::test]
async fn test_account_assignment_update_uses_put() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(
            "/api/2.0/accounts/acct-1/workspaces/42/permissionassignments/principals/11",
        ))
        .and(body_json(json!({"permissions": ["ADMIN"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        AccountClient::new(&server.uri(), "acct-1", AuthConfig::Token("pat".into()), TIMEOUT).unwrap();
    client
        .update_permission_assignment(42, 11, &[WorkspacePermission::Admin])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_account_assignments_are_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/accounts/acct-1/workspaces/42/permissionassignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permission_assignments": [
                {"principal": {"principal_id": 11, "display_name": "ops", "group_name": "ops"}, "permissions": ["ADMIN"]},
                {"principal": {"principal_id": 12, "display_name": "analysts"}, "permissions": ["USER"]}
            ]
        })))
        .mount(&server)
        .await;

    let client =
        AccountClient::new(&server.uri(), "acct-1", AuthConfig::Token("pat".into()), TIMEOUT).unwrap();
    let assignments = client.list_permission_assignments(42).await.unwrap();
    assert_eq!(assignments.len(), 2);
    assert!(assignments[0].is_admin());
    assert!(!assignments[1].is_admin());
}
