//! The user-facing `Ready` condition.

use super::ResourceState;
use crate::crd::{Condition, CONDITION_FALSE, CONDITION_TRUE};

pub const READY_CONDITION: &str = "Ready";
pub const READY_REASON_SETTLED: &str = "Settled";
pub const READY_REASON_PENDING: &str = "Pending";
pub const READY_REASON_ERROR: &str = "Error";

/// Build the `Ready` condition summarising a lifecycle state
///
/// `Deleted` has no user-facing summary since the resource is about to disappear;
/// it is reported as an error should it ever be asked for.
#[must_use]
pub fn ready_condition(state: ResourceState) -> Condition {
    let (status, reason, message) = match state {
        ResourceState::Initial => (
            CONDITION_FALSE,
            READY_REASON_PENDING,
            "Resource is in initial state.".to_string(),
        ),
        ResourceState::ImportRequested => (
            CONDITION_FALSE,
            READY_REASON_PENDING,
            "Resource is being imported.".to_string(),
        ),
        ResourceState::Creating
        | ResourceState::Updating
        | ResourceState::Deleting
        | ResourceState::DeletionRequested => (
            CONDITION_FALSE,
            READY_REASON_PENDING,
            "Resource is pending.".to_string(),
        ),
        ResourceState::Imported => (
            CONDITION_TRUE,
            READY_REASON_SETTLED,
            "Resource is imported.".to_string(),
        ),
        ResourceState::Created | ResourceState::Updated => (
            CONDITION_TRUE,
            READY_REASON_SETTLED,
            "Resource is settled.".to_string(),
        ),
        ResourceState::Deleted => (
            CONDITION_FALSE,
            READY_REASON_ERROR,
            format!("unknown state: {state}"),
        ),
    };

    Condition {
        r#type: READY_CONDITION.to_string(),
        status: status.to_string(),
        observed_generation: None,
        last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message: Some(message),
    }
}

/// Build a `Ready` condition reporting an error
#[must_use]
pub fn ready_error_condition(message: impl Into<String>) -> Condition {
    Condition {
        r#type: READY_CONDITION.to_string(),
        status: CONDITION_FALSE.to_string(),
        observed_generation: None,
        last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        reason: Some(READY_REASON_ERROR.to_string()),
        message: Some(message.into()),
    }
}
