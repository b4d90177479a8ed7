//! # FlexCluster v20250312
//!
//! Drives a flex cluster through its lifecycle using the 2025-03-12 spec block.
//!
//! External coordinates (group id and cluster name) come from the recorded
//! status when present, so an imported cluster keeps addressing the external
//! object it was imported from. Otherwise they come from the spec.

use crate::handlers::keeps_external_resource;
use crate::constants::{EXTERNAL_GROUP_ID_ANNOTATION, EXTERNAL_NAME_ANNOTATION};
use crate::controller::reconciler::{
    advance, fail_in_place, should_update_with_dependencies, DependencyRef, HandlerResult,
    Patcher, ResourceClient,
};
use crate::crd::{FlexCluster, FlexClusterSpecV20250312, FlexClusterStatus, FlexClusterStatusV20250312};
use crate::provider::{
    ApiConnector, ApiCredentials, FlexClusterApi, FlexClusterCreate, FlexClusterDescription,
    FlexClusterUpdate,
};
use crate::provider::atlas::{ProviderSettingsCreate, ResourceTag};
use crate::state::ResourceState;
use anyhow::{anyhow, Context, Result};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Handler for one pass over a `FlexCluster` with a 2025-03-12 spec
pub struct FlexClusterHandlerV20250312 {
    client: Arc<dyn ResourceClient<FlexCluster>>,
    connector: Arc<dyn ApiConnector>,
    credentials: ApiCredentials,
    dependencies: Vec<DependencyRef>,
    deletion_protection: bool,
}

impl std::fmt::Debug for FlexClusterHandlerV20250312 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexClusterHandlerV20250312")
            .field("credentials", &self.credentials)
            .field("dependencies", &self.dependencies)
            .field("deletion_protection", &self.deletion_protection)
            .finish_non_exhaustive()
    }
}

impl FlexClusterHandlerV20250312 {
    #[must_use]
    pub fn new(
        client: Arc<dyn ResourceClient<FlexCluster>>,
        connector: Arc<dyn ApiConnector>,
        credentials: ApiCredentials,
        dependencies: Vec<DependencyRef>,
        deletion_protection: bool,
    ) -> Self {
        Self {
            client,
            connector,
            credentials,
            dependencies,
            deletion_protection,
        }
    }

    async fn api(&self) -> Result<Arc<dyn FlexClusterApi>> {
        self.connector
            .connect(&self.credentials)
            .await
            .context("failed to authenticate with the database service")
    }

    pub async fn handle_initial(
        &self,
        obj: &FlexCluster,
        spec: &FlexClusterSpecV20250312,
    ) -> HandlerResult {
        let state = ResourceState::Initial;
        let (group_id, name) = match coordinates(obj, spec) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let created = match self.create(&group_id, spec).await {
            Ok(created) => created,
            Err(e) => return fail_in_place(state, e),
        };
        info!(
            resource.name = %obj.name_any(),
            cluster = %name,
            "Flex cluster creation requested"
        );

        if let Err(e) = self.record(obj, &created, &group_id, &name, true).await {
            return fail_in_place(state, e);
        }
        advance(ResourceState::Creating, "Creating Flex Cluster.")
    }

    pub async fn handle_import_requested(&self, obj: &FlexCluster) -> HandlerResult {
        let state = ResourceState::ImportRequested;
        let (group_id, name) = match import_coordinates(obj) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let existing = match self.get(&group_id, &name).await {
            Ok(existing) => existing,
            Err(e) => return fail_in_place(state, e.context(format!("failed to import flex cluster {name}"))),
        };

        if let Err(e) = self.record(obj, &existing, &group_id, &name, false).await {
            return fail_in_place(state, e);
        }
        advance(ResourceState::Imported, "Import completed.")
    }

    /// Poll a create or update until the service settles
    pub async fn handle_upserting(
        &self,
        obj: &FlexCluster,
        spec: &FlexClusterSpecV20250312,
        state: ResourceState,
    ) -> HandlerResult {
        let (group_id, name) = match coordinates(obj, spec) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let current = match self.get(&group_id, &name).await {
            Ok(current) => current,
            Err(e) => return fail_in_place(state, e),
        };

        if let Err(e) = self.record(obj, &current, &group_id, &name, false).await {
            return fail_in_place(state, e);
        }

        if current.is_upserting() {
            debug!(
                resource.name = %obj.name_any(),
                external_state = current.state_name.as_deref().unwrap_or_default(),
                "Flex cluster still upserting"
            );
            return advance(state, "Upserting Flex Cluster.");
        }

        match state {
            ResourceState::Creating => advance(ResourceState::Created, "Flex Cluster created."),
            _ => advance(ResourceState::Updated, "Flex Cluster updated."),
        }
    }

    /// Update a settled cluster when the spec, dependencies or reapply schedule require it
    pub async fn handle_idle(
        &self,
        obj: &FlexCluster,
        spec: &FlexClusterSpecV20250312,
        state: ResourceState,
    ) -> HandlerResult {
        let update = match should_update_with_dependencies(obj, &self.dependencies) {
            Ok(update) => update,
            Err(e) => return fail_in_place(state, e),
        };
        if !update {
            return advance(state, "Flex cluster up to date. No update required.");
        }

        let (group_id, name) = match coordinates(obj, spec) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let updated = match self.update(&group_id, &name, spec).await {
            Ok(updated) => updated,
            Err(e) => return fail_in_place(state, e),
        };
        info!(
            resource.name = %obj.name_any(),
            cluster = %name,
            "Flex cluster update requested"
        );

        if let Err(e) = self.record(obj, &updated, &group_id, &name, true).await {
            return fail_in_place(state, e);
        }
        advance(ResourceState::Updating, "Updating Flex Cluster.")
    }

    pub async fn handle_deletion_requested(
        &self,
        obj: &FlexCluster,
        spec: &FlexClusterSpecV20250312,
    ) -> HandlerResult {
        let state = ResourceState::DeletionRequested;
        if keeps_external_resource(obj, self.deletion_protection) {
            info!(
                resource.name = %obj.name_any(),
                "Keeping external flex cluster"
            );
            return advance(ResourceState::Deleted, "Flex Cluster kept in the database service.");
        }

        if recorded_status(obj).is_none() {
            return advance(ResourceState::Deleted, "Flex Cluster is unmanaged.");
        }

        let (group_id, name) = match coordinates(obj, spec) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let api = match self.api().await {
            Ok(api) => api,
            Err(e) => return fail_in_place(state, e),
        };
        match api.delete_flex_cluster(&group_id, &name).await {
            Ok(()) => advance(ResourceState::Deleting, "Deleting Flex Cluster."),
            Err(e) if e.is_not_found() => {
                advance(ResourceState::Deleted, "Flex Cluster already deleted.")
            }
            Err(e) => fail_in_place(state, e),
        }
    }

    pub async fn handle_deleting(
        &self,
        obj: &FlexCluster,
        spec: &FlexClusterSpecV20250312,
    ) -> HandlerResult {
        let state = ResourceState::Deleting;
        let (group_id, name) = match coordinates(obj, spec) {
            Ok(coordinates) => coordinates,
            Err(e) => return fail_in_place(state, e),
        };

        let api = match self.api().await {
            Ok(api) => api,
            Err(e) => return fail_in_place(state, e),
        };
        match api.get_flex_cluster(&group_id, &name).await {
            Ok(_) => advance(ResourceState::Deleting, "Flex Cluster is being deleted."),
            Err(e) if e.is_not_found() => advance(ResourceState::Deleted, "Flex Cluster deleted."),
            Err(e) => fail_in_place(state, e),
        }
    }

    async fn create(
        &self,
        group_id: &str,
        spec: &FlexClusterSpecV20250312,
    ) -> Result<FlexClusterDescription> {
        let entry = &spec.entry;
        let body = FlexClusterCreate {
            name: entry.name.clone(),
            provider_settings: ProviderSettingsCreate {
                backing_provider_name: entry.provider_settings.backing_provider_name.clone(),
                region_name: entry.provider_settings.region_name.clone(),
            },
            termination_protection_enabled: entry.termination_protection_enabled,
            tags: tags(entry.tags.as_ref()),
        };

        let api = self.api().await?;
        api.create_flex_cluster(group_id, &body)
            .await
            .with_context(|| format!("failed to create flex cluster {}", entry.name))
    }

    async fn get(&self, group_id: &str, name: &str) -> Result<FlexClusterDescription> {
        let api = self.api().await?;
        api.get_flex_cluster(group_id, name)
            .await
            .with_context(|| format!("failed to get flex cluster {name}"))
    }

    async fn update(
        &self,
        group_id: &str,
        name: &str,
        spec: &FlexClusterSpecV20250312,
    ) -> Result<FlexClusterDescription> {
        let body = FlexClusterUpdate {
            termination_protection_enabled: spec.entry.termination_protection_enabled,
            tags: tags(spec.entry.tags.as_ref()),
        };

        let api = self.api().await?;
        api.update_flex_cluster(group_id, name, &body)
            .await
            .with_context(|| format!("failed to update flex cluster {name}"))
    }

    /// Persist the observed external state, and the state tracker when `track` is set
    async fn record(
        &self,
        obj: &FlexCluster,
        description: &FlexClusterDescription,
        group_id: &str,
        name: &str,
        track: bool,
    ) -> Result<()> {
        let mut updated = obj.clone();
        updated
            .status
            .get_or_insert_with(FlexClusterStatus::default)
            .v20250312 = Some(observed_status(description, group_id, name));

        let mut patcher = Patcher::new(&updated).update_status();
        if track {
            patcher = patcher.update_state_tracker(&self.dependencies);
        }
        patcher
            .patch(self.client.as_ref())
            .await
            .context("failed to record flex cluster status")
    }
}

fn recorded_status(obj: &FlexCluster) -> Option<&FlexClusterStatusV20250312> {
    obj.status.as_ref().and_then(|s| s.v20250312.as_ref())
}

/// Group id and cluster name addressing the external object
fn coordinates(obj: &FlexCluster, spec: &FlexClusterSpecV20250312) -> Result<(String, String)> {
    if let Some(FlexClusterStatusV20250312 {
        group_id: Some(group_id),
        name: Some(name),
        ..
    }) = recorded_status(obj)
    {
        return Ok((group_id.clone(), name.clone()));
    }

    let group_id = spec
        .group_id
        .clone()
        .filter(|g| !g.is_empty())
        .ok_or_else(|| anyhow!("spec.v20250312.groupId is required"))?;
    Ok((group_id, spec.entry.name.clone()))
}

fn import_coordinates(obj: &FlexCluster) -> Result<(String, String)> {
    let annotation = |key: &str| {
        obj.annotations()
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| anyhow!("missing annotation {key}"))
    };
    Ok((
        annotation(EXTERNAL_GROUP_ID_ANNOTATION)?,
        annotation(EXTERNAL_NAME_ANNOTATION)?,
    ))
}

fn observed_status(
    description: &FlexClusterDescription,
    group_id: &str,
    name: &str,
) -> FlexClusterStatusV20250312 {
    FlexClusterStatusV20250312 {
        id: description.id.clone(),
        group_id: Some(
            description
                .group_id
                .clone()
                .unwrap_or_else(|| group_id.to_string()),
        ),
        name: Some(description.name.clone().unwrap_or_else(|| name.to_string())),
        state_name: description.state_name.clone(),
        mongo_db_version: description.mongo_db_version.clone(),
        connection_string: description
            .connection_strings
            .as_ref()
            .and_then(|c| c.standard_srv.clone()),
    }
}

fn tags(tags: Option<&BTreeMap<String, String>>) -> Vec<ResourceTag> {
    tags.into_iter()
        .flatten()
        .map(|(key, value)| ResourceTag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}
