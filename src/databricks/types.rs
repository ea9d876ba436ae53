use serde::{Deserialize, Serialize};
use std::fmt;

/// SCIM group as returned by the workspace and account APIs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlements: Vec<ComplexValue>,
}

impl Group {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            entitlements: Vec::new(),
        }
    }

    pub fn with_entitlements<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entitlements
            .extend(values.into_iter().map(ComplexValue::new));
        self
    }

    pub fn entitlement_values(&self) -> impl Iterator<Item = &str> {
        self.entitlements.iter().map(|e| e.value.as_str())
    }
}

/// SCIM multi-valued attribute entry (`{"value": ...}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplexValue {
    pub value: String,
}

impl ComplexValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Workspace-level permission granted to a principal through the account API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkspacePermission {
    Admin,
    User,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for WorkspacePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkspacePermission::Admin => "ADMIN",
            WorkspacePermission::User => "USER",
            WorkspacePermission::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Principal {
    pub principal_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

/// A principal's permissions on a workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionAssignment {
    pub principal: Principal,
    #[serde(default)]
    pub permissions: Vec<WorkspacePermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PermissionAssignment {
    pub fn is_admin(&self) -> bool {
        self.permissions.contains(&WorkspacePermission::Admin)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListType {
    #[default]
    Allow,
    Block,
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListType::Allow => f.write_str("ALLOW"),
            ListType::Block => f.write_str("BLOCK"),
        }
    }
}

/// Workspace IP access list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpAccessList {
    pub list_id: String,
    pub label: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    pub list_type: ListType,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateIpAccessList {
    pub label: String,
    pub list_type: ListType,
    pub ip_addresses: Vec<String>,
}

/// Partial update; unset fields are left unchanged remotely
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UpdateIpAccessList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
