//! # FlexCluster
//!
//! A serverless-style database cluster managed in the external database service.
//!
//! The spec is versioned: exactly one API version block must be populated, and the
//! handler for that version owns all external calls.
//!
//! ```yaml
//! apiVersion: dbaas.microscaler.io/v1
//! kind: FlexCluster
//! metadata:
//!   name: orders
//!   namespace: shop
//!   annotations:
//!     dbaas.microscaler.io/reapply-period: 1h
//! spec:
//!   connectionSecretRef:
//!     name: dbaas-credentials
//!   v20250312:
//!     groupId: 5f1b2c3d4e5f6a7b8c9d0e1f
//!     entry:
//!       name: orders
//!       providerSettings:
//!         backingProviderName: AWS
//!         regionName: US_EAST_1
//! ```

use super::condition::{Condition, StateObject};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "FlexCluster",
    group = "dbaas.microscaler.io",
    version = "v1",
    namespaced,
    status = "FlexClusterStatus",
    shortname = "fc",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.conditions[?(@.type==\"State\")].reason"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterSpec {
    /// Secret holding the API credentials. Falls back to the operator-wide secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_secret_ref: Option<ConnectionSecretRef>,
    /// Spec for API version 2025-03-12
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v20250312: Option<FlexClusterSpecV20250312>,
}

/// Reference to a secret in the resource's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSecretRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterSpecV20250312 {
    /// Project (group) the cluster belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub entry: FlexClusterEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterEntry {
    /// Cluster name in the external service
    pub name: String,
    pub provider_settings: ProviderSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_protection_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Cloud provider hosting the cluster (AWS, AZURE, GCP)
    pub backing_provider_name: String,
    pub region_name: String,
}

/// Status of a FlexCluster
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterStatus {
    /// `State` and `Ready` conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed external state for API version 2025-03-12
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v20250312: Option<FlexClusterStatusV20250312>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlexClusterStatusV20250312 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// External lifecycle state (`CREATING`, `IDLE`, `UPDATING`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongo_db_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

impl StateObject for FlexCluster {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}
