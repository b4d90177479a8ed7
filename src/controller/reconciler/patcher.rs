//! # Patcher
//!
//! Accumulates status and metadata mutations against a minimal shadow of a
//! managed resource and applies them as independently scoped server-side apply
//! patches.
//!
//! Apply order is fixed: status fields, then conditions, then the main object.
//! A failure aborts the remaining patches, so an annotation (such as the state
//! tracker) is never recorded for a status that was not persisted.
//!
//! ```ignore
//! Patcher::new(&cluster)
//!     .update_status()
//!     .update_state_tracker(&dependencies)
//!     .patch(client.as_ref())
//!     .await?;
//! ```

use super::client::ResourceClient;
use super::tracker::{compute_fingerprint, DependencyRef};
use crate::constants::{CONDITIONS_FIELD_MANAGER, FIELD_MANAGER, STATE_TRACKER_ANNOTATION};
use crate::crd::{Condition, StateObject};
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Status(kube::Error),

    #[error(transparent)]
    Object(kube::Error),
}

/// Builder of status and annotation patches for one resource
#[derive(Debug)]
pub struct Patcher<'a, K: StateObject> {
    live: &'a K,
    namespace: String,
    name: String,
    generation: Option<i64>,
    /// Optimistic-concurrency token, refreshed after each successful patch
    resource_version: Option<String>,
    status: Option<Map<String, Value>>,
    conditions: Option<Vec<Condition>>,
    annotations: BTreeMap<String, String>,
    deferred: Option<serde_json::Error>,
}

impl<'a, K: StateObject> Patcher<'a, K> {
    #[must_use]
    pub fn new(live: &'a K) -> Self {
        Self {
            live,
            namespace: live.namespace().unwrap_or_default(),
            name: live.name_any(),
            generation: live.meta().generation,
            resource_version: live.resource_version(),
            status: None,
            conditions: None,
            annotations: BTreeMap::new(),
            deferred: None,
        }
    }

    /// Record the fingerprint of the live object and `dependencies`
    #[must_use]
    pub fn update_state_tracker(mut self, dependencies: &[DependencyRef]) -> Self {
        self.annotations.insert(
            STATE_TRACKER_ANNOTATION.to_string(),
            compute_fingerprint(self.live, dependencies),
        );
        self
    }

    /// Copy the live status, except conditions, into the status patch
    #[must_use]
    pub fn update_status(mut self) -> Self {
        match status_without_conditions(self.live) {
            Ok(status) => self.status = Some(status),
            Err(e) => self.deferred = Some(e),
        }
        self
    }

    /// Replace the conditions
    #[must_use]
    pub fn update_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Drop the concurrency precondition from every patch
    ///
    /// For fields owned exclusively by the caller, where a newer resource
    /// version cannot hold a competing value.
    #[must_use]
    pub fn without_resource_version(mut self) -> Self {
        self.resource_version = None;
        self
    }

    /// Apply the accumulated patches
    ///
    /// # Errors
    ///
    /// Returns the first failure; later patches are not attempted.
    pub async fn patch(mut self, client: &dyn ResourceClient<K>) -> Result<(), PatchError> {
        if let Some(e) = self.deferred.take() {
            return Err(PatchError::Serialize(e));
        }

        if let Some(status) = self.status.take() {
            let body = self.shadow(|shadow| {
                shadow.insert("status".to_string(), Value::Object(status));
            });
            self.apply_status(client, FIELD_MANAGER, body).await?;
        }

        if let Some(conditions) = self.conditions.take() {
            let conditions = serde_json::to_value(conditions)?;
            let body = self.shadow(|shadow| {
                shadow.insert("status".to_string(), json!({ "conditions": conditions }));
            });
            self.apply_status(client, CONDITIONS_FIELD_MANAGER, body)
                .await?;
        }

        if !self.annotations.is_empty() {
            let annotations = std::mem::take(&mut self.annotations);
            let body = self.shadow(|shadow| {
                if let Some(Value::Object(metadata)) = shadow.get_mut("metadata") {
                    metadata.insert("annotations".to_string(), json!(annotations));
                }
            });
            debug!(resource.name = %self.name, "Applying object patch");
            client
                .apply(&self.namespace, &self.name, body)
                .await
                .map_err(PatchError::Object)?;
        }

        Ok(())
    }

    async fn apply_status(
        &mut self,
        client: &dyn ResourceClient<K>,
        field_manager: &str,
        body: Value,
    ) -> Result<(), PatchError> {
        debug!(
            resource.name = %self.name,
            field_manager,
            "Applying status patch"
        );
        let patched = client
            .apply_status(&self.namespace, &self.name, field_manager, body)
            .await
            .map_err(PatchError::Status)?;

        if self.resource_version.is_some() {
            self.resource_version = patched.resource_version();
        }
        Ok(())
    }

    fn shadow(&self, fill: impl FnOnce(&mut Map<String, Value>)) -> Value {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!(self.name));
        metadata.insert("namespace".to_string(), json!(self.namespace));
        if let Some(generation) = self.generation {
            metadata.insert("generation".to_string(), json!(generation));
        }
        if let Some(resource_version) = &self.resource_version {
            metadata.insert("resourceVersion".to_string(), json!(resource_version));
        }

        let mut shadow = Map::new();
        shadow.insert("apiVersion".to_string(), json!(K::api_version(&())));
        shadow.insert("kind".to_string(), json!(K::kind(&())));
        shadow.insert("metadata".to_string(), Value::Object(metadata));
        fill(&mut shadow);
        Value::Object(shadow)
    }
}

fn status_without_conditions<K: StateObject>(
    live: &K,
) -> Result<Map<String, Value>, serde_json::Error> {
    let mut status = match serde_json::to_value(live)? {
        Value::Object(mut object) => match object.remove("status") {
            Some(Value::Object(status)) => status,
            _ => Map::new(),
        },
        _ => Map::new(),
    };
    status.remove("conditions");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::client::MockResourceClient;
    use crate::crd::{
        FlexCluster, FlexClusterSpec, FlexClusterStatus, FlexClusterStatusV20250312,
    };
    use mockall::Sequence;

    fn cluster(resource_version: &str) -> FlexCluster {
        let mut obj = FlexCluster::new("orders", FlexClusterSpec::default());
        obj.metadata.namespace = Some("shop".to_string());
        obj.metadata.generation = Some(4);
        obj.metadata.resource_version = Some(resource_version.to_string());
        obj.status = Some(FlexClusterStatus {
            conditions: vec![Condition {
                r#type: "State".to_string(),
                status: "True".to_string(),
                reason: Some("Creating".to_string()),
                ..Condition::default()
            }],
            v20250312: Some(FlexClusterStatusV20250312 {
                id: Some("abc".to_string()),
                state_name: Some("IDLE".to_string()),
                ..FlexClusterStatusV20250312::default()
            }),
        });
        obj
    }

    fn failure(message: &'static str) -> kube::Error {
        kube::Error::Service(message.into())
    }

    #[tokio::test]
    async fn test_nothing_marked_sends_nothing() {
        let mut client = MockResourceClient::<FlexCluster>::new();
        client.expect_apply_status().never();
        client.expect_apply().never();

        Patcher::new(&cluster("10")).patch(&client).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_body_excludes_conditions() {
        let mut client = MockResourceClient::<FlexCluster>::new();
        client
            .expect_apply_status()
            .withf(|ns, name, manager, body| {
                ns == "shop"
                    && name == "orders"
                    && manager == FIELD_MANAGER
                    && *body
                        == json!({
                            "apiVersion": "dbaas.microscaler.io/v1",
                            "kind": "FlexCluster",
                            "metadata": {
                                "name": "orders",
                                "namespace": "shop",
                                "generation": 4,
                                "resourceVersion": "10"
                            },
                            "status": {
                                "v20250312": {"id": "abc", "stateName": "IDLE"}
                            }
                        })
            })
            .times(1)
            .returning(|_, _, _, _| Ok(cluster("11")));
        client.expect_apply().never();

        Patcher::new(&cluster("10"))
            .update_status()
            .patch(&client)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_then_object_with_refreshed_resource_version() {
        let mut seq = Sequence::new();
        let mut client = MockResourceClient::<FlexCluster>::new();
        client
            .expect_apply_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(cluster("11")));
        client
            .expect_apply()
            .withf(|_, _, body| {
                body["metadata"]["resourceVersion"] == "11"
                    && body["metadata"]["annotations"][STATE_TRACKER_ANNOTATION].is_string()
                    && body.get("status").is_none()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(cluster("12")));

        Patcher::new(&cluster("10"))
            .update_status()
            .update_state_tracker(&[])
            .patch(&client)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_failure_skips_object_patch() {
        let mut client = MockResourceClient::<FlexCluster>::new();
        client
            .expect_apply_status()
            .times(1)
            .returning(|_, _, _, _| Err(failure("status rejected")));
        client.expect_apply().never();

        let err = Patcher::new(&cluster("10"))
            .update_status()
            .update_state_tracker(&[])
            .patch(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::Status(_)));
        assert!(err.to_string().contains("status rejected"));
    }

    #[tokio::test]
    async fn test_conditions_use_their_own_field_manager() {
        let mut client = MockResourceClient::<FlexCluster>::new();
        client
            .expect_apply_status()
            .withf(|_, _, manager, body| {
                manager == CONDITIONS_FIELD_MANAGER
                    && body["status"]["conditions"][0]["reason"] == "Created"
                    && body["status"].get("v20250312").is_none()
                    && body["metadata"].get("resourceVersion").is_none()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(cluster("11")));

        let conditions = vec![Condition {
            r#type: "State".to_string(),
            status: "True".to_string(),
            reason: Some("Created".to_string()),
            ..Condition::default()
        }];
        Patcher::new(&cluster("10"))
            .without_resource_version()
            .update_conditions(conditions)
            .patch(&client)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_object_failure_is_returned() {
        let mut client = MockResourceClient::<FlexCluster>::new();
        client
            .expect_apply()
            .returning(|_, _, _| Err(failure("conflict")));

        let err = Patcher::new(&cluster("10"))
            .update_state_tracker(&[])
            .patch(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::Object(_)));
    }

    #[test]
    fn test_status_without_conditions_when_status_absent() {
        let obj = FlexCluster::new("orders", FlexClusterSpec::default());
        assert!(status_without_conditions(&obj).unwrap().is_empty());
    }
}
