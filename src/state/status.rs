//! Deriving and persisting the `State` condition.

use super::{ResourceState, UnsupportedState};
use crate::crd::{Condition, CONDITION_FALSE, CONDITION_TRUE};

/// Condition type whose reason carries the lifecycle state name
pub const STATE_CONDITION: &str = "State";

/// Find the condition of the given type
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Replace the condition with the same type in place, or append it
///
/// The previous transition time is kept while status, reason and message are
/// unchanged, so re-asserting an identical condition produces an identical status.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions
        .iter_mut()
        .find(|c| c.r#type == condition.r#type)
    {
        Some(existing) => {
            if existing.status == condition.status
                && existing.reason == condition.reason
                && existing.message == condition.message
            {
                condition
                    .last_transition_time
                    .clone_from(&existing.last_transition_time);
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

/// Derive the current lifecycle state from persisted conditions
///
/// A missing `State` condition means the resource has never been reconciled and
/// is `Initial`. A present condition is trusted as-is: a missing or unknown reason
/// is reported rather than silently reset.
///
/// # Errors
///
/// Returns `UnsupportedState` when the stored reason is not a known state name.
pub fn derive_state(conditions: &[Condition]) -> Result<ResourceState, UnsupportedState> {
    match find_condition(conditions, STATE_CONDITION) {
        None => Ok(ResourceState::Initial),
        Some(condition) => condition.reason.as_deref().unwrap_or_default().parse(),
    }
}

/// Upsert the `State` condition, stamping a fresh transition time on change
pub fn set_state(
    conditions: &mut Vec<Condition>,
    observed_generation: i64,
    state: ResourceState,
    message: &str,
    healthy: bool,
) {
    set_condition(
        conditions,
        Condition {
            r#type: STATE_CONDITION.to_string(),
            status: if healthy { CONDITION_TRUE } else { CONDITION_FALSE }.to_string(),
            observed_generation: Some(observed_generation),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(state.as_str().to_string()),
            message: Some(message.to_string()),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_condition(reason: Option<&str>) -> Condition {
        Condition {
            r#type: STATE_CONDITION.to_string(),
            status: CONDITION_TRUE.to_string(),
            reason: reason.map(str::to_string),
            ..Condition::default()
        }
    }

    mod derive_state_tests {
        use super::*;

        #[test]
        fn test_no_conditions_is_initial() {
            assert_eq!(derive_state(&[]), Ok(ResourceState::Initial));
        }

        #[test]
        fn test_only_ready_condition_is_initial() {
            let ready = Condition {
                r#type: "Ready".to_string(),
                status: CONDITION_TRUE.to_string(),
                reason: Some("Settled".to_string()),
                ..Condition::default()
            };
            assert_eq!(derive_state(&[ready]), Ok(ResourceState::Initial));
        }

        #[test]
        fn test_reason_is_the_state() {
            let conditions = vec![state_condition(Some("Updating"))];
            assert_eq!(derive_state(&conditions), Ok(ResourceState::Updating));
        }

        #[test]
        fn test_empty_reason_is_unsupported() {
            let conditions = vec![state_condition(Some(""))];
            let err = derive_state(&conditions).unwrap_err();
            assert_eq!(err.to_string(), r#"unsupported state """#);

            let conditions = vec![state_condition(None)];
            assert_eq!(
                derive_state(&conditions),
                Err(UnsupportedState(String::new()))
            );
        }
    }

    mod set_state_tests {
        use super::*;

        #[test]
        fn test_appends_when_absent() {
            let mut conditions = Vec::new();
            set_state(&mut conditions, 3, ResourceState::Creating, "Creating.", true);

            assert_eq!(conditions.len(), 1);
            let c = &conditions[0];
            assert_eq!(c.r#type, STATE_CONDITION);
            assert_eq!(c.status, CONDITION_TRUE);
            assert_eq!(c.reason.as_deref(), Some("Creating"));
            assert_eq!(c.message.as_deref(), Some("Creating."));
            assert_eq!(c.observed_generation, Some(3));
            assert!(c.last_transition_time.is_some());
        }

        #[test]
        fn test_replaces_in_place() {
            let ready = Condition {
                r#type: "Ready".to_string(),
                status: CONDITION_TRUE.to_string(),
                ..Condition::default()
            };
            let mut conditions = vec![state_condition(Some("Creating")), ready.clone()];
            set_state(&mut conditions, 4, ResourceState::Created, "done", false);

            assert_eq!(conditions.len(), 2);
            assert_eq!(conditions[0].reason.as_deref(), Some("Created"));
            assert_eq!(conditions[0].status, CONDITION_FALSE);
            assert_eq!(conditions[1], ready);
        }

        #[test]
        fn test_unchanged_state_keeps_transition_time() {
            let mut previous = state_condition(Some("Created"));
            previous.message = Some("settled".to_string());
            previous.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
            let mut conditions = vec![previous];

            set_state(&mut conditions, 5, ResourceState::Created, "settled", true);
            assert_eq!(
                conditions[0].last_transition_time.as_deref(),
                Some("2025-01-01T00:00:00+00:00")
            );
            assert_eq!(conditions[0].observed_generation, Some(5));

            set_state(&mut conditions, 6, ResourceState::Updating, "updating", true);
            assert_ne!(
                conditions[0].last_transition_time.as_deref(),
                Some("2025-01-01T00:00:00+00:00")
            );
        }

        #[test]
        fn test_changed_message_stamps_new_transition_time() {
            let mut previous = state_condition(Some("Created"));
            previous.message = Some("settled".to_string());
            previous.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
            let mut conditions = vec![previous];

            set_state(&mut conditions, 5, ResourceState::Created, "still settled", true);
            assert_ne!(
                conditions[0].last_transition_time.as_deref(),
                Some("2025-01-01T00:00:00+00:00")
            );
            assert_eq!(conditions[0].message.as_deref(), Some("still settled"));
        }
    }
}
