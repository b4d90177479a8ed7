//! Observed-generation carry-over across state transitions.
//!
//! While an external operation is in flight (and when it settles) the `State`
//! condition keeps the generation that started the operation. Every other
//! transition records the live generation.

use super::status::{find_condition, STATE_CONDITION};
use super::ResourceState;
use crate::crd::Condition;

/// Transitions that keep the previous observed generation
pub const GENERATION_CARRY_OVER: [(ResourceState, ResourceState); 7] = [
    (ResourceState::Creating, ResourceState::Creating),
    (ResourceState::Creating, ResourceState::Created),
    (ResourceState::Updating, ResourceState::Updating),
    (ResourceState::Updating, ResourceState::Updated),
    (ResourceState::DeletionRequested, ResourceState::Deleting),
    (ResourceState::Deleting, ResourceState::Deleting),
    (ResourceState::Deleting, ResourceState::Deleted),
];

#[must_use]
pub fn carries_observed_generation(from: ResourceState, to: ResourceState) -> bool {
    GENERATION_CARRY_OVER.contains(&(from, to))
}

/// Observed generation to record for a transition into `next`
///
/// Without a prior `State` condition, or when the prior reason is not a known
/// state, the live generation is used.
#[must_use]
pub fn observed_generation(
    live_generation: i64,
    previous: &[Condition],
    next: ResourceState,
) -> i64 {
    let Some(prior) = find_condition(previous, STATE_CONDITION) else {
        return live_generation;
    };
    let Some(from) = prior
        .reason
        .as_deref()
        .and_then(|reason| reason.parse::<ResourceState>().ok())
    else {
        return live_generation;
    };

    if carries_observed_generation(from, next) {
        prior.observed_generation.unwrap_or(live_generation)
    } else {
        live_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CONDITION_TRUE;

    fn prior(reason: &str, observed_generation: i64) -> Vec<Condition> {
        vec![Condition {
            r#type: STATE_CONDITION.to_string(),
            status: CONDITION_TRUE.to_string(),
            reason: Some(reason.to_string()),
            observed_generation: Some(observed_generation),
            ..Condition::default()
        }]
    }

    #[test]
    fn test_no_prior_condition_uses_live_generation() {
        assert_eq!(observed_generation(5, &[], ResourceState::Created), 5);
    }

    #[test]
    fn test_creating_to_created_keeps_previous() {
        let previous = prior("Creating", 7);
        assert_eq!(observed_generation(2, &previous, ResourceState::Created), 7);
    }

    #[test]
    fn test_every_carry_over_pair_keeps_previous() {
        for (from, to) in GENERATION_CARRY_OVER {
            let previous = prior(from.as_str(), 11);
            assert_eq!(
                observed_generation(12, &previous, to),
                11,
                "{from} -> {to}"
            );
        }
    }

    #[test]
    fn test_other_pairs_use_live_generation() {
        for from in ResourceState::ALL {
            for to in ResourceState::ALL {
                if carries_observed_generation(from, to) {
                    continue;
                }
                let previous = prior(from.as_str(), 1);
                assert_eq!(observed_generation(9, &previous, to), 9, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_unknown_prior_reason_uses_live_generation() {
        let previous = prior("Paused", 1);
        assert_eq!(observed_generation(4, &previous, ResourceState::Created), 4);
    }
}
