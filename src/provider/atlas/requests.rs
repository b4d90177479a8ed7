//! # Request Types
//!
//! Flex cluster request bodies for API version 2024-11-13.

use serde::Serialize;

/// Body of `POST /api/atlas/v2/groups/{groupId}/flexClusters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterCreate {
    pub name: String,
    pub provider_settings: ProviderSettingsCreate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_protection_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettingsCreate {
    pub backing_provider_name: String,
    pub region_name: String,
}

/// Body of `PATCH /api/atlas/v2/groups/{groupId}/flexClusters/{name}`
///
/// Provider settings are immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_protection_enabled: Option<bool>,
    pub tags: Vec<ResourceTag>,
}

/// Key/value tag; the API models tags as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}
