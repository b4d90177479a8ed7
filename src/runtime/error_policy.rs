//! # Error Policy
//!
//! Retry scheduling for failed passes and classification of watch stream errors.

use super::ControllerContext;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::utils::resource_key;
use crate::controller::reconciler::ReconcilerError;
use crate::crd::StateObject;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed pass with per-resource Fibonacci backoff
///
/// An unreadable stored state cannot heal by retrying, so it waits the
/// maximum interval instead of walking the backoff sequence.
pub fn handle_reconciliation_error<K: StateObject>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<ControllerContext<K>>,
) -> Action {
    let key = resource_key(obj.as_ref());

    if error.is_terminal() {
        error!(
            resource.key = %key,
            error = %error,
            "Resource has an unsupported state; manual repair required"
        );
        metrics::increment_unsupported_states();
        return Action::requeue(Duration::from_secs(ctx.backoff_max_secs));
    }

    let delay = next_backoff(&ctx, &key);
    warn!(resource.key = %key, error = %error, "Reconciliation failed");
    info!(
        resource.key = %key,
        "Retrying with Fibonacci backoff in {}s",
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Advance the backoff of `key`
pub(crate) fn next_backoff<K: StateObject>(ctx: &ControllerContext<K>, key: &str) -> Duration {
    match ctx.backoff_states.lock() {
        Ok(mut states) => states
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(ctx.backoff_start_secs, ctx.backoff_max_secs))
            .next_backoff(),
        Err(e) => {
            warn!("Failed to lock backoff states: {}, using maximum backoff", e);
            Duration::from_secs(ctx.backoff_max_secs)
        }
    }
}

/// Forget the backoff of `key` after a successful pass
pub(crate) fn reset_backoff<K: StateObject>(ctx: &ControllerContext<K>, key: &str) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            states.remove(key);
        }
        Err(e) => warn!("Failed to lock backoff states: {}", e),
    }
}

/// Watch stream failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401, credentials or RBAC revoked
    Unauthorized,
    /// 410, resource version too old; the watcher relists on its own
    Expired,
    /// 429, API server storage reinitializing
    TooManyRequests,
    /// 404, usually the CRD is not installed
    NotFound,
    Other,
}

/// Classify a rendered watch error
///
/// Not-found is checked before unauthorized: a plain-text 404 surfaces as a
/// decode error whose text also mentions the failed watch.
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    let is_not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if (error.contains("401") || error.contains("Unauthorized")) && !is_not_found {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorKind::TooManyRequests
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Log a watch stream error and pause where retrying immediately cannot help
pub async fn handle_watch_stream_error(error: &str, restart_delay: Duration) {
    match classify_watch_error(error) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized): check the controller's \
                ServiceAccount, ClusterRole and ClusterRoleBinding"
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "Watch resource version expired, relisting");
        }
        WatchErrorKind::TooManyRequests => {
            warn!(
                "API server storage reinitializing (429), backing off for {}s",
                restart_delay.as_secs()
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Watched resource not found (404), is the CRD installed? Error: {}",
                error
            );
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error);
            tokio::time::sleep(restart_delay).await;
        }
    }
}
