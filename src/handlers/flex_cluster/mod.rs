//! # FlexCluster Handler
//!
//! Resolves the per-pass context of a `FlexCluster` (spec version, connection
//! Secret, service account credentials) and delegates every lifecycle
//! operation to the handler for the populated spec version.
//!
//! ## Connection Secret
//!
//! `spec.connectionSecretRef` names a Secret in the resource's namespace.
//! Without it the operator-wide Secret is used. The Secret is the only
//! dependency feeding the state tracker, so rotating credentials forces an
//! update, and Secret events requeue every cluster that uses it.

mod v20250312;

pub use v20250312::FlexClusterHandlerV20250312;

use super::{credentials_from_secret, SecretReader};
use crate::controller::reconciler::{
    select_version, DependencyRef, HandlerError, HandlerResult, ResourceClient, StateHandler,
};
use crate::crd::{FlexCluster, FlexClusterSpecV20250312};
use crate::provider::ApiConnector;
use crate::state::ResourceState;
use anyhow::anyhow;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::{Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::debug;

/// Operator-wide credentials Secret location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSecret {
    pub namespace: String,
    pub name: String,
}

/// `StateHandler` for `FlexCluster`
pub struct FlexClusterHandler {
    client: Arc<dyn ResourceClient<FlexCluster>>,
    secrets: Arc<dyn SecretReader>,
    connector: Arc<dyn ApiConnector>,
    global_secret: GlobalSecret,
    deletion_protection: bool,
    /// Secret watch wiring; no watch is added without one
    secret_watch: Option<SecretWatch>,
}

#[derive(Clone)]
struct SecretWatch {
    client: Client,
    namespace: Option<String>,
}

/// Where Secret events are watched
#[derive(Debug, Clone, PartialEq, Eq)]
struct SecretWatchScope {
    /// `None` watches the whole cluster
    namespace: Option<String>,
    field_selector: Option<String>,
}

impl std::fmt::Debug for FlexClusterHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexClusterHandler")
            .field("global_secret", &self.global_secret)
            .field("deletion_protection", &self.deletion_protection)
            .finish_non_exhaustive()
    }
}

impl FlexClusterHandler {
    #[must_use]
    pub fn new(
        client: Arc<dyn ResourceClient<FlexCluster>>,
        secrets: Arc<dyn SecretReader>,
        connector: Arc<dyn ApiConnector>,
        global_secret: GlobalSecret,
        deletion_protection: bool,
    ) -> Self {
        Self {
            client,
            secrets,
            connector,
            global_secret,
            deletion_protection,
            secret_watch: None,
        }
    }

    /// Requeue clusters when the Secrets they use change
    ///
    /// With a `namespace` only Secrets in that namespace are watched, plus the
    /// operator-wide Secret when it lives elsewhere.
    #[must_use]
    pub fn with_secret_watch(mut self, client: Client, namespace: Option<&str>) -> Self {
        self.secret_watch = Some(SecretWatch {
            client,
            namespace: namespace.map(str::to_string),
        });
        self
    }

    /// Namespace and name of the connection Secret of `obj`
    fn secret_location(&self, obj: &FlexCluster) -> (String, String) {
        match &obj.spec.connection_secret_ref {
            Some(reference) => (obj.namespace().unwrap_or_default(), reference.name.clone()),
            None => (
                self.global_secret.namespace.clone(),
                self.global_secret.name.clone(),
            ),
        }
    }

    /// Build the version handler for this pass
    async fn for_version<'a>(
        &self,
        obj: &'a FlexCluster,
        state: ResourceState,
    ) -> Result<(FlexClusterHandlerV20250312, &'a FlexClusterSpecV20250312), HandlerError> {
        let in_place = |source: anyhow::Error| HandlerError { state, source };

        let spec = select_version([obj.spec.v20250312.as_ref()]).map_err(|e| in_place(e.into()))?;

        let (namespace, name) = self.secret_location(obj);
        let secret = self
            .secrets
            .get(&namespace, &name)
            .await
            .map_err(|e| {
                in_place(
                    anyhow::Error::new(e).context(format!("failed to read secret {namespace}/{name}")),
                )
            })?
            .ok_or_else(|| in_place(anyhow!("connection secret {namespace}/{name} not found")))?;
        let credentials = credentials_from_secret(&secret).map_err(in_place)?;

        debug!(
            resource.name = %obj.name_any(),
            secret.namespace = %namespace,
            secret.name = %name,
            "Resolved connection secret"
        );

        let handler = FlexClusterHandlerV20250312::new(
            Arc::clone(&self.client),
            Arc::clone(&self.connector),
            credentials,
            vec![DependencyRef::from_resource(&secret)],
            self.deletion_protection,
        );
        Ok((handler, spec))
    }
}

fn secret_watch_scopes(
    watch_namespace: Option<&str>,
    global_secret: &GlobalSecret,
) -> Vec<SecretWatchScope> {
    let Some(namespace) = watch_namespace else {
        return vec![SecretWatchScope {
            namespace: None,
            field_selector: None,
        }];
    };

    let mut scopes = vec![SecretWatchScope {
        namespace: Some(namespace.to_string()),
        field_selector: None,
    }];
    if global_secret.namespace != namespace {
        scopes.push(SecretWatchScope {
            namespace: Some(global_secret.namespace.clone()),
            field_selector: Some(format!("metadata.name={}", global_secret.name)),
        });
    }
    scopes
}

/// Clusters in `clusters` whose connection Secret is `secret`
#[must_use]
pub fn clusters_for_secret(
    secret: &Secret,
    clusters: &[Arc<FlexCluster>],
    global_secret: &GlobalSecret,
) -> Vec<ObjectRef<FlexCluster>> {
    let secret_namespace = secret.namespace().unwrap_or_default();
    let secret_name = secret.name_any();
    let is_global =
        secret_namespace == global_secret.namespace && secret_name == global_secret.name;

    clusters
        .iter()
        .filter(|cluster| match &cluster.spec.connection_secret_ref {
            Some(reference) => {
                reference.name == secret_name
                    && cluster.namespace().as_deref() == Some(secret_namespace.as_str())
            }
            None => is_global,
        })
        .map(|cluster| ObjectRef::from_obj(cluster.as_ref()))
        .collect()
}

#[async_trait]
impl StateHandler<FlexCluster> for FlexClusterHandler {
    async fn handle_initial(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Initial).await?;
        handler.handle_initial(obj, spec).await
    }

    async fn handle_import_requested(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, _) = self
            .for_version(obj, ResourceState::ImportRequested)
            .await?;
        handler.handle_import_requested(obj).await
    }

    async fn handle_imported(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Imported).await?;
        handler.handle_idle(obj, spec, ResourceState::Imported).await
    }

    async fn handle_creating(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Creating).await?;
        handler
            .handle_upserting(obj, spec, ResourceState::Creating)
            .await
    }

    async fn handle_created(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Created).await?;
        handler.handle_idle(obj, spec, ResourceState::Created).await
    }

    async fn handle_updating(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Updating).await?;
        handler
            .handle_upserting(obj, spec, ResourceState::Updating)
            .await
    }

    async fn handle_updated(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Updated).await?;
        handler.handle_idle(obj, spec, ResourceState::Updated).await
    }

    async fn handle_deletion_requested(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self
            .for_version(obj, ResourceState::DeletionRequested)
            .await?;
        handler.handle_deletion_requested(obj, spec).await
    }

    async fn handle_deleting(&self, obj: &FlexCluster) -> HandlerResult {
        let (handler, spec) = self.for_version(obj, ResourceState::Deleting).await?;
        handler.handle_deleting(obj, spec).await
    }

    fn configure(&self, controller: Controller<FlexCluster>) -> Controller<FlexCluster> {
        let Some(watch) = self.secret_watch.clone() else {
            return controller;
        };

        let store = controller.store();
        secret_watch_scopes(watch.namespace.as_deref(), &self.global_secret)
            .into_iter()
            .fold(controller, |controller, scope| {
                let api: Api<Secret> = match &scope.namespace {
                    Some(namespace) => Api::namespaced(watch.client.clone(), namespace),
                    None => Api::all(watch.client.clone()),
                };
                let mut config = watcher::Config::default().any_semantic();
                if let Some(fields) = &scope.field_selector {
                    config = config.fields(fields);
                }

                debug!(
                    secret.namespace = scope.namespace.as_deref().unwrap_or("*"),
                    "Watching connection secrets"
                );
                let store = store.clone();
                let global_secret = self.global_secret.clone();
                controller.watches(api, config, move |secret| {
                    clusters_for_secret(&secret, &store.state(), &global_secret)
                })
            })
    }
}
