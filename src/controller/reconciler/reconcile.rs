//! # Reconcile Pass
//!
//! Orchestrates one pass over a managed resource:
//!
//! 1. Load the object (absent means fully deleted)
//! 2. Honour the skip policy on the stored state
//! 3. Ensure the finalizer
//! 4. Derive the current state and dispatch to exactly one handler operation
//! 5. Schedule a reapply for settled resources
//! 6. Record the `State` and `Ready` conditions, or remove the finalizer once
//!    the resource reached `Deleted`
//!
//! The pass holds no locks and spawns no tasks. Per-key serialization is the
//! host controller's responsibility.

use super::client::ResourceClient;
use super::error::ReconcilerError;
use super::finalizer::{ensure_finalizers, unset_finalizers};
use super::handler::StateHandler;
use super::patcher::Patcher;
use super::reapply::patch_reapply_timestamp;
use super::result::{advance, HandlerError, StateResult};
use crate::constants::{
    EXTERNAL_ANNOTATION_PREFIX, FINALIZER, RECONCILIATION_POLICY_ANNOTATION,
    RECONCILIATION_POLICY_SKIP,
};
use crate::crd::StateObject;
use crate::observability::metrics;
use crate::state::{
    derive_state, observed_generation, ready_condition, ready_error_condition, set_condition,
    set_state, ResourceState, UnsupportedState,
};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

/// What a pass decided before anything is persisted
#[derive(Debug)]
pub struct StateOutcome {
    /// State the handler was dispatched for
    pub current_state: ResourceState,
    pub result: StateResult,
    /// Handler failure; `result` then holds the state it was pinned to
    pub error: Option<HandlerError>,
}

/// Lifecycle state machine for resources of kind `K`
pub struct StateReconciler<K: StateObject> {
    client: Arc<dyn ResourceClient<K>>,
    handler: Arc<dyn StateHandler<K>>,
    reapply_support: bool,
}

impl<K: StateObject> fmt::Debug for StateReconciler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReconciler")
            .field("kind", &K::kind(&()))
            .field("reapply_support", &self.reapply_support)
            .finish_non_exhaustive()
    }
}

impl<K: StateObject> StateReconciler<K> {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient<K>>, handler: Arc<dyn StateHandler<K>>) -> Self {
        Self {
            client,
            handler,
            reapply_support: false,
        }
    }

    /// Enable periodic reapply for settled resources of this kind
    #[must_use]
    pub fn with_reapply_support(mut self, enabled: bool) -> Self {
        self.reapply_support = enabled;
        self
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn StateHandler<K>> {
        &self.handler
    }

    /// Run one pass for the resource identified by `namespace`/`name`
    ///
    /// # Errors
    ///
    /// Handler failures are returned after their status has been recorded.
    /// Every other error aborts the pass at the failing phase.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        let span = tracing::info_span!(
            "reconcile",
            resource.kind = %K::kind(&()),
            resource.namespace = namespace,
            resource.name = name,
        );

        let start = Instant::now();
        metrics::increment_reconciliations();
        let result = self.reconcile_internal(namespace, name).instrument(span).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors();
        }
        result
    }

    async fn reconcile_internal(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Action, ReconcilerError> {
        let Some(obj) = self
            .client
            .get(namespace, name)
            .await
            .map_err(ReconcilerError::Get)?
        else {
            debug!("Object not found, nothing to reconcile");
            return Ok(Action::await_change());
        };

        if skips_reconciliation(&obj) {
            if matches!(derive_state(obj.conditions()), Ok(ResourceState::Deleted)) {
                unset_finalizers(self.client.as_ref(), &obj, &[FINALIZER])
                    .await
                    .map_err(ReconcilerError::UnsetFinalizers)?;
            }
            info!("Reconciliation skipped by policy annotation");
            return Ok(Action::await_change());
        }

        // The API server rejects new finalizers once deletion has started
        let obj = if obj.meta().deletion_timestamp.is_none() {
            ensure_finalizers(self.client.as_ref(), &obj, &[FINALIZER])
                .await
                .map_err(ReconcilerError::Finalizers)?
                .unwrap_or(obj)
        } else {
            obj
        };

        let outcome = match self.reconcile_state(&obj).await {
            Ok(outcome) => outcome,
            Err(ReconcilerError::UnsupportedState(e)) => {
                self.report_unsupported(&obj, &e).await;
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };

        self.finish(&obj, outcome).await
    }

    /// Derive the current state, dispatch it, and schedule a reapply
    ///
    /// Nothing is written to the status here; only the reapply timestamp
    /// annotation may be patched.
    ///
    /// # Errors
    ///
    /// `UnsupportedState` when the stored state cannot be read, `Reapply` when
    /// the reapply annotations are invalid or cannot be patched.
    pub async fn reconcile_state(&self, obj: &K) -> Result<StateOutcome, ReconcilerError> {
        let mut current_state = derive_state(obj.conditions())?;
        if current_state == ResourceState::Initial && requests_import(obj) {
            current_state = ResourceState::ImportRequested;
        }
        if obj.meta().deletion_timestamp.is_some() && current_state != ResourceState::Deleting {
            current_state = ResourceState::DeletionRequested;
        }

        debug!(state = %current_state, "Dispatching state handler");
        let (mut result, error) = match self.dispatch(current_state, obj).await {
            Ok(result) => (result, None),
            Err(e) => (
                StateResult {
                    next_state: e.state,
                    message: e.to_string(),
                    requeue_after: None,
                },
                Some(e),
            ),
        };

        if self.reapply_support
            && error.is_none()
            && result.next_state.is_settled()
            && result.requeue_after.is_none()
        {
            let delay = patch_reapply_timestamp(self.client.as_ref(), obj)
                .await
                .map_err(ReconcilerError::Reapply)?;
            if !delay.is_zero() {
                result.requeue_after = Some(delay);
            }
        }

        Ok(StateOutcome {
            current_state,
            result,
            error,
        })
    }

    async fn dispatch(&self, state: ResourceState, obj: &K) -> super::result::HandlerResult {
        let handler = self.handler.as_ref();
        match state {
            ResourceState::Initial => handler.handle_initial(obj).await,
            ResourceState::ImportRequested => handler.handle_import_requested(obj).await,
            ResourceState::Imported => handler.handle_imported(obj).await,
            ResourceState::Creating => handler.handle_creating(obj).await,
            ResourceState::Created => handler.handle_created(obj).await,
            ResourceState::Updating => handler.handle_updating(obj).await,
            ResourceState::Updated => handler.handle_updated(obj).await,
            ResourceState::DeletionRequested => handler.handle_deletion_requested(obj).await,
            ResourceState::Deleting => handler.handle_deleting(obj).await,
            ResourceState::Deleted => advance(ResourceState::Deleted, "Resource is deleted"),
        }
    }

    async fn finish(&self, obj: &K, outcome: StateOutcome) -> Result<Action, ReconcilerError> {
        let StateOutcome {
            current_state,
            result,
            error,
        } = outcome;
        let next_state = result.next_state;

        if next_state == ResourceState::Deleted {
            unset_finalizers(self.client.as_ref(), obj, &[FINALIZER])
                .await
                .map_err(ReconcilerError::UnsetFinalizers)?;
            info!("Resource deleted, finalizer removed");
            return match error {
                Some(e) => {
                    warn!(state = %next_state, error = %e, "State handler failed");
                    Err(e.into())
                }
                None => Ok(Action::await_change()),
            };
        }

        let live_generation = obj.meta().generation.unwrap_or_default();
        let mut conditions = obj.conditions().to_vec();
        let generation = observed_generation(live_generation, &conditions, next_state);
        set_state(
            &mut conditions,
            generation,
            next_state,
            &result.message,
            error.is_none(),
        );

        let mut ready = match &error {
            Some(e) => ready_error_condition(e.to_string()),
            None => ready_condition(next_state),
        };
        ready.observed_generation = Some(generation);
        set_condition(&mut conditions, ready);

        Patcher::new(obj)
            .without_resource_version()
            .update_conditions(conditions)
            .patch(self.client.as_ref())
            .await
            .map_err(ReconcilerError::PatchStatus)?;

        if next_state != current_state {
            info!(from = %current_state, to = %next_state, "State transition");
            metrics::increment_state_transition(next_state.as_str());
        }

        match error {
            Some(e) => {
                warn!(state = %next_state, error = %e, "State handler failed");
                Err(e.into())
            }
            None => Ok(requeue_action(result.requeue_after)),
        }
    }

    /// Surface an unreadable stored state on the `Ready` condition
    ///
    /// The `State` condition is left as found so the stored value can be
    /// inspected and repaired.
    async fn report_unsupported(&self, obj: &K, err: &UnsupportedState) {
        error!(error = %err, "Stored lifecycle state is not supported");

        let mut conditions = obj.conditions().to_vec();
        let mut ready = ready_error_condition(err.to_string());
        ready.observed_generation = obj.meta().generation;
        set_condition(&mut conditions, ready);

        if let Err(e) = Patcher::new(obj)
            .without_resource_version()
            .update_conditions(conditions)
            .patch(self.client.as_ref())
            .await
        {
            warn!(error = %e, "Failed to report unsupported state");
        }
    }
}

fn requeue_action(requeue_after: Option<Duration>) -> Action {
    match requeue_after {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

fn skips_reconciliation<K: ResourceExt>(obj: &K) -> bool {
    obj.annotations()
        .get(RECONCILIATION_POLICY_ANNOTATION)
        .is_some_and(|policy| policy == RECONCILIATION_POLICY_SKIP)
}

fn requests_import<K: ResourceExt>(obj: &K) -> bool {
    obj.annotations()
        .keys()
        .any(|key| key.starts_with(EXTERNAL_ANNOTATION_PREFIX))
}
