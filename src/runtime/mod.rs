//! # Runtime
//!
//! Host side of the controller: process initialization, the watch loop driving
//! reconcile passes, and the error policy deciding when failed passes retry.
//!
//! The watch loop and error policy are generic over the managed kind; only
//! initialization knows which kinds and handlers are wired in.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::StateReconciler;
use crate::crd::StateObject;
use std::collections::HashMap;
use std::sync::Mutex;

/// Shared context passed to every reconcile and error-policy call
pub struct ControllerContext<K: StateObject> {
    pub reconciler: StateReconciler<K>,
    /// Per-resource backoff, keyed by `namespace/name`
    pub backoff_states: Mutex<HashMap<String, FibonacciBackoff>>,
    pub backoff_start_secs: u64,
    pub backoff_max_secs: u64,
}

impl<K: StateObject> std::fmt::Debug for ControllerContext<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("reconciler", &self.reconciler)
            .field("backoff_start_secs", &self.backoff_start_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl<K: StateObject> ControllerContext<K> {
    #[must_use]
    pub fn new(reconciler: StateReconciler<K>, backoff_start_secs: u64, backoff_max_secs: u64) -> Self {
        Self {
            reconciler,
            backoff_states: Mutex::new(HashMap::new()),
            backoff_start_secs,
            backoff_max_secs,
        }
    }
}
