use super::error::ApiResult;
use super::http::HttpClient;
use super::types::{ComplexValue, Group};
use serde::{Deserialize, Serialize};

/// Page size for SCIM list requests
pub const SCIM_PAGE_SIZE: usize = 100;

const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimListResponse<T> {
    #[serde(rename = "Resources", default = "Vec::new")]
    resources: Vec<T>,
    #[serde(default)]
    total_results: Option<usize>,
}

/// SCIM PatchOp request body
#[derive(Debug, Serialize, PartialEq)]
pub struct PatchRequest {
    schemas: Vec<&'static str>,
    #[serde(rename = "Operations")]
    operations: Vec<PatchOperation>,
}

#[derive(Debug, Serialize, PartialEq)]
struct PatchOperation {
    op: &'static str,
    path: &'static str,
    value: Vec<ComplexValue>,
}

impl PatchRequest {
    /// Additive patch of the group's `entitlements` attribute
    pub fn add_entitlements(values: &[String]) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA],
            operations: vec![PatchOperation {
                op: "add",
                path: "entitlements",
                value: values.iter().map(ComplexValue::new).collect(),
            }],
        }
    }
}

/// List every group at a SCIM `Groups` endpoint, following `startIndex` paging.
pub async fn list_groups(
    http: &HttpClient,
    path: &str,
    attributes: &str,
) -> ApiResult<Vec<Group>> {
    let mut groups = Vec::new();
    let mut start_index = 1;

    loop {
        let query = [
            ("attributes", attributes.to_string()),
            ("startIndex", start_index.to_string()),
            ("count", SCIM_PAGE_SIZE.to_string()),
        ];
        let page: ScimListResponse<Group> = http.get_json(path, &query).await?;
        let fetched = page.resources.len();
        groups.extend(page.resources);

        // Without totalResults, a short page is the last one
        let last_page = match page.total_results {
            Some(total) => groups.len() >= total,
            None => fetched < SCIM_PAGE_SIZE,
        };
        if fetched == 0 || last_page {
            break;
        }
        start_index += fetched;
    }

    Ok(groups)
}
