//! # Platform Client
//!
//! The narrow set of API-server operations the reconciler performs on a managed
//! resource, behind a trait so passes can be exercised without a cluster.

use crate::constants::FIELD_MANAGER;
use crate::crd::StateObject;
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

/// Kubernetes operations on resources of kind `K`
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient<K: StateObject>: Send + Sync {
    /// Fetch the live object, `None` when it no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error>;

    /// Apply an RFC 6902 JSON patch to the main object
    async fn json_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: json_patch::Patch,
    ) -> Result<K, kube::Error>;

    /// Server-side apply a partial object, forcing ownership of its fields
    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        body: serde_json::Value,
    ) -> Result<K, kube::Error>;

    /// Server-side apply a partial object to the status subresource
    async fn apply_status(
        &self,
        namespace: &str,
        name: &str,
        field_manager: &str,
        body: serde_json::Value,
    ) -> Result<K, kube::Error>;
}

/// `ResourceClient` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient").finish_non_exhaustive()
    }
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StateObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn apply_params(field_manager: &str) -> PatchParams {
        PatchParams::apply(field_manager).force()
    }
}

#[async_trait]
impl<K: StateObject> ResourceClient<K> for KubeResourceClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        self.api::<K>(namespace).get_opt(name).await
    }

    async fn json_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: json_patch::Patch,
    ) -> Result<K, kube::Error> {
        self.api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::<()>::Json(patch))
            .await
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        body: serde_json::Value,
    ) -> Result<K, kube::Error> {
        self.api::<K>(namespace)
            .patch(name, &Self::apply_params(FIELD_MANAGER), &Patch::Apply(&body))
            .await
    }

    async fn apply_status(
        &self,
        namespace: &str,
        name: &str,
        field_manager: &str,
        body: serde_json::Value,
    ) -> Result<K, kube::Error> {
        self.api::<K>(namespace)
            .patch_status(name, &Self::apply_params(field_manager), &Patch::Apply(&body))
            .await
    }
}
