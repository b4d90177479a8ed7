//! # Reconciler
//!
//! Generic lifecycle state machine for resources managed in an external
//! database service.
//!
//! The reconciler:
//! - Derives the lifecycle state from the persisted `State` condition
//! - Guards deletion with a finalizer until external cleanup completes
//! - Dispatches exactly one state handler operation per pass
//! - Schedules periodic reapplies of settled resources
//! - Records `State` and `Ready` conditions with server-side apply
//!
//! ## Reconciliation Flow
//!
//! 1. Load the object
//! 2. Honour the `skip` reconciliation policy
//! 3. Ensure the finalizer
//! 4. Derive the state (import and deletion reclassification) and dispatch
//! 5. Reapply settled resources whose period elapsed
//! 6. Patch conditions, or remove the finalizer on `Deleted`

pub mod client;
pub mod error;
pub mod finalizer;
pub mod handler;
pub mod patcher;
pub mod reapply;
pub mod reconcile;
pub mod result;
pub mod tracker;
pub mod update;
pub mod utils;
pub mod validation;
pub mod versioned;

// Re-export public API
pub use client::{KubeResourceClient, ResourceClient};
pub use error::ReconcilerError;
pub use finalizer::{ensure_finalizers, unset_finalizers};
pub use handler::StateHandler;
pub use patcher::{PatchError, Patcher};
pub use reapply::{
    patch_reapply_timestamp, reapply_period, reapply_timestamp, should_reapply, ReapplyError,
};
pub use reconcile::{StateOutcome, StateReconciler};
pub use result::{advance, fail_in_place, HandlerError, HandlerResult, StateResult};
pub use tracker::{compute_fingerprint, DependencyRef};
pub use update::{dependencies_changed, should_update, should_update_with_dependencies};
pub use versioned::{select_version, SelectVersionError};
