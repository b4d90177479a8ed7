//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client and the reconciler for each managed kind.

use super::ControllerContext;
use crate::config::{create_shared_config, SharedControllerConfig, SharedServerConfig};
use crate::controller::reconciler::{KubeResourceClient, ResourceClient, StateReconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::FlexCluster;
use crate::handlers::flex_cluster::GlobalSecret;
use crate::handlers::{FlexClusterHandler, KubeSecretReader};
use crate::observability;
use crate::provider::AtlasConnector;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_LOG_FILTER: &str = "dbaas_state_controller=info,kube=warn";

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// API for FlexCluster, scoped to the watch namespace
    pub clusters: Api<FlexCluster>,
    pub context: Arc<ControllerContext<FlexCluster>>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when metrics cannot be registered, the HTTP server does not come
/// up, or no Kubernetes client can be configured.
pub async fn initialize() -> Result<InitializationResult> {
    // Must precede any TLS use; rustls 0.23 has no implicit provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let (controller_config, server_config) = create_shared_config();

    init_tracing(&controller_config.read().await.log_format);

    info!("Starting dbaas-state-controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = server_config.read().await.metrics_port;

    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let config = controller_config.read().await.clone();
    let clusters: Api<FlexCluster> = match config.namespace_filter() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let resource_client: Arc<dyn ResourceClient<FlexCluster>> =
        Arc::new(KubeResourceClient::new(client.clone()));
    let connector = AtlasConnector::new(config.api_base_url.as_str())
        .context("Failed to create database service connector")?;
    let handler = FlexClusterHandler::new(
        Arc::clone(&resource_client),
        Arc::new(KubeSecretReader::new(client.clone())),
        Arc::new(connector),
        GlobalSecret {
            namespace: config.global_secret_namespace.clone(),
            name: config.global_secret_name.clone(),
        },
        config.deletion_protection,
    )
    .with_secret_watch(client.clone(), config.namespace_filter());

    let reconciler = StateReconciler::new(resource_client, Arc::new(handler))
        .with_reapply_support(config.reapply_support);
    let context = Arc::new(ControllerContext::new(
        reconciler,
        config.backoff_start_secs,
        config.backoff_max_secs,
    ));

    log_existing_resources(&clusters).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        clusters,
        context,
        server_state,
        controller_config,
        server_config,
    })
}

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let result = if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &SharedServerConfig,
) -> Result<()> {
    let config = server_config.read().await;
    let startup_timeout = config.startup_timeout();
    let poll_interval = config.poll_interval();
    drop(config);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log a per-namespace summary of existing resources
///
/// A failed list usually means the CRD is not installed. Startup continues and
/// the watch loop reports the error until it is.
async fn log_existing_resources(clusters: &Api<FlexCluster>) {
    let list = match clusters.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: crdgen | kubectl apply -f -");
            return;
        }
    };

    info!(
        "CRD is queryable, found {} existing FlexCluster resources",
        list.items.len()
    );

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.metadata.namespace.clone().unwrap_or_default())
            .or_default()
            .push(item.metadata.name.clone().unwrap_or_default());
    }

    for (namespace, mut names) in by_namespace {
        names.sort();
        let shown = if names.len() <= 3 {
            names.join(", ")
        } else {
            format!("{}, ... ({} total)", names[..3].join(", "), names.len())
        };
        info!("Namespace {}: {}", namespace, shown);
    }
}
