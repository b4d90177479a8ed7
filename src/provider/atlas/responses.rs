//! # Response Types
//!
//! Flex cluster and authentication payloads returned by the service.

use super::requests::ResourceTag;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Flex cluster as described by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// `IDLE`, `CREATING`, `UPDATING`, `DELETING` or `REPAIRING`
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default, rename = "mongoDBVersion")]
    pub mongo_db_version: Option<String>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
    #[serde(default)]
    pub termination_protection_enabled: Option<bool>,
    #[serde(default)]
    pub tags: Vec<ResourceTag>,
}

impl FlexClusterDescription {
    /// Whether the service is still applying a create or update
    #[must_use]
    pub fn is_upserting(&self) -> bool {
        matches!(self.state_name.as_deref(), Some("CREATING" | "UPDATING"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrings {
    #[serde(default)]
    pub standard_srv: Option<String>,
}

/// Error document returned with non-success statuses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

/// OAuth client-credentials token
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}
