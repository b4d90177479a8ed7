//! # Results
//!
//! The value every state handler returns, and the two constructors handlers use
//! to build it.

use crate::constants::DEFAULT_TRANSITION_REQUEUE_SECS;
use crate::state::ResourceState;
use std::time::Duration;

/// Outcome of one handler invocation
///
/// Never persisted: it is turned into conditions and a requeue directive by the
/// reconciler, then dropped. The default value has `Initial` as next state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateResult {
    pub next_state: ResourceState,
    pub message: String,
    /// Explicit requeue; `None` waits for the next change notification
    pub requeue_after: Option<Duration>,
}

/// A handler failure pinned to the state the handler was invoked in
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct HandlerError {
    /// State to record; the state machine does not advance
    pub state: ResourceState,
    #[source]
    pub source: anyhow::Error,
}

pub type HandlerResult = Result<StateResult, HandlerError>;

/// Move to `next_state`
///
/// Transitional states get a default requeue so progress is polled without
/// waiting for an external change notification.
#[must_use]
pub fn advance(next_state: ResourceState, message: impl Into<String>) -> HandlerResult {
    let mut message = message.into();
    if !message.ends_with('.') {
        message.push('.');
    }
    let requeue_after = next_state
        .is_transitional()
        .then(|| Duration::from_secs(DEFAULT_TRANSITION_REQUEUE_SECS));

    Ok(StateResult {
        next_state,
        message,
        requeue_after,
    })
}

/// Stay in `current_state` and report `err`
pub fn fail_in_place(current_state: ResourceState, err: impl Into<anyhow::Error>) -> HandlerResult {
    Err(HandlerError {
        state: current_state,
        source: err.into(),
    })
}
