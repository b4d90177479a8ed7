//! # Watch Loop
//!
//! Runs the kube-runtime controller for one managed kind and restarts it when
//! its stream ends, until a shutdown signal arrives.

use super::error_policy::{handle_reconciliation_error, handle_watch_stream_error, reset_backoff};
use super::ControllerContext;
use crate::config::SharedControllerConfig;
use crate::controller::reconciler::utils::resource_key;
use crate::controller::reconciler::ReconcilerError;
use crate::controller::server::ServerState;
use crate::crd::StateObject;
use anyhow::Result;
use futures::StreamExt;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::{self, Action};
use kube_runtime::Controller;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the watch loop for kind `K`
///
/// The readiness flag doubles as the shutdown marker: it is cleared when
/// SIGINT or SIGTERM is received, and the loop exits instead of restarting.
///
/// # Errors
///
/// Currently infallible; the signature leaves room for startup checks.
pub async fn run_watch_loop<K: StateObject>(
    api: Api<K>,
    ctx: Arc<ControllerContext<K>>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<()> {
    let kind = K::kind(&()).into_owned();
    info!("Starting controller watch loop for {}...", kind);

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let restart_delay = controller_config.read().await.watch_restart_delay();
        let handler = Arc::clone(ctx.reconciler.handler());

        let controller = Controller::new(api.clone(), handler.watcher_config()).shutdown_on_signal();
        let controller = handler.configure(controller);

        let watch_span = tracing::info_span!("controller.watch", resource.kind = %kind);
        controller
            .run(reconcile, handle_reconciliation_error, Arc::clone(&ctx))
            .for_each(|result| async move {
                match result {
                    Ok((object, action)) => {
                        debug!(resource.name = %object.name, action = ?action, "watch.event.reconciled");
                    }
                    // already logged and scheduled by the error policy
                    Err(controller::Error::ReconcilerFailed(_, object)) => {
                        debug!(resource.name = %object.name, "watch.event.reconciliation_failed");
                    }
                    Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
                }
            })
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

async fn reconcile<K: StateObject>(
    obj: Arc<K>,
    ctx: Arc<ControllerContext<K>>,
) -> Result<Action, ReconcilerError> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let result = ctx.reconciler.reconcile(&namespace, &name).await;
    if result.is_ok() {
        reset_backoff(&ctx, &resource_key(obj.as_ref()));
    }
    result
}

/// Resolve on SIGINT, or SIGTERM on Unix
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }
}
