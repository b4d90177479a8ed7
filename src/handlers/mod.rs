//! # Resource Handlers
//!
//! `StateHandler` implementations for the resource kinds this operator manages,
//! plus the helpers they share.
//!
//! - `flex_cluster` - `FlexCluster` handlers (top-level and per API version)

pub mod flex_cluster;

pub use flex_cluster::FlexClusterHandler;

use crate::constants::{RESOURCE_POLICY_ANNOTATION, RESOURCE_POLICY_DELETE, RESOURCE_POLICY_KEEP};
use crate::provider::ApiCredentials;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::{Client, ResourceExt};
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// Secret key holding the service account client id
pub const CLIENT_ID_KEY: &str = "clientId";

/// Secret key holding the service account client secret
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

/// Read access to Kubernetes Secrets
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Fetch a Secret, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, kube::Error>;
}

/// `SecretReader` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeSecretReader {
    client: Client,
}

impl std::fmt::Debug for KubeSecretReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretReader").finish_non_exhaustive()
    }
}

impl KubeSecretReader {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretReader for KubeSecretReader {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, kube::Error> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }
}

/// Extract service account credentials from a connection Secret
///
/// # Errors
///
/// Fails when either key is missing or not valid UTF-8.
pub fn credentials_from_secret(secret: &Secret) -> Result<ApiCredentials> {
    let read = |key: &str| -> Result<String> {
        let value = secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .ok_or_else(|| {
                anyhow!(
                    "secret {}/{} has no {key} key",
                    secret.namespace().unwrap_or_default(),
                    secret.name_any()
                )
            })?;
        String::from_utf8(value.0.clone())
            .with_context(|| format!("secret key {key} is not valid UTF-8"))
    };

    Ok(ApiCredentials::new(
        read(CLIENT_ID_KEY)?,
        read(CLIENT_SECRET_KEY)?,
    ))
}

/// Whether the external resource must survive deletion of `obj`
///
/// An absent or unrecognised policy falls back to `deletion_protection`.
#[must_use]
pub fn keeps_external_resource<K: ResourceExt>(obj: &K, deletion_protection: bool) -> bool {
    match obj.annotations().get(RESOURCE_POLICY_ANNOTATION).map(String::as_str) {
        Some(RESOURCE_POLICY_KEEP) => true,
        Some(RESOURCE_POLICY_DELETE) => false,
        Some(other) => {
            warn!(
                resource.name = %obj.name_any(),
                policy = other,
                "Ignoring unknown resource policy"
            );
            deletion_protection
        }
        None => deletion_protection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FlexCluster, FlexClusterSpec};
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret(entries: &[(&str, &[u8])]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("creds".to_string()),
                namespace: Some("shop".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    fn with_policy(policy: Option<&str>) -> FlexCluster {
        let mut obj = FlexCluster::new("orders", FlexClusterSpec::default());
        if let Some(policy) = policy {
            obj.metadata.annotations = Some(BTreeMap::from([(
                RESOURCE_POLICY_ANNOTATION.to_string(),
                policy.to_string(),
            )]));
        }
        obj
    }

    #[test]
    fn test_credentials_from_secret() {
        let credentials =
            credentials_from_secret(&secret(&[("clientId", b"svc"), ("clientSecret", b"s3cr3t")]))
                .unwrap();
        assert_eq!(credentials.client_id(), "svc");
        assert_eq!(credentials.client_secret(), "s3cr3t");
    }

    #[test]
    fn test_missing_key_names_the_secret() {
        let err = credentials_from_secret(&secret(&[("clientId", b"svc")])).unwrap_err();
        assert_eq!(err.to_string(), "secret shop/creds has no clientSecret key");
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = credentials_from_secret(&secret(&[
            ("clientId", &[0xff, 0xfe]),
            ("clientSecret", b"s3cr3t"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("clientId"));
    }

    #[test]
    fn test_resource_policy() {
        assert!(keeps_external_resource(&with_policy(Some("keep")), false));
        assert!(!keeps_external_resource(&with_policy(Some("delete")), true));
        assert!(keeps_external_resource(&with_policy(None), true));
        assert!(!keeps_external_resource(&with_policy(None), false));
        assert!(keeps_external_resource(&with_policy(Some("retain")), true));
    }
}
