//! # Lifecycle State
//!
//! The closed set of lifecycle states a managed resource moves through, and the
//! pure translation between a status condition list and a state value.
//!
//! - `status.rs` - Deriving and persisting the `State` condition
//! - `ready.rs` - The user-facing `Ready` condition
//! - `generation.rs` - Observed-generation carry-over across transitions

mod generation;
mod ready;
mod status;

pub use generation::{carries_observed_generation, observed_generation, GENERATION_CARRY_OVER};
pub use ready::{
    ready_condition, ready_error_condition, READY_CONDITION, READY_REASON_ERROR,
    READY_REASON_PENDING, READY_REASON_SETTLED,
};
pub use status::{derive_state, find_condition, set_condition, set_state, STATE_CONDITION};

use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a managed resource
///
/// Persisted as the reason of the `State` condition. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResourceState {
    #[default]
    Initial,
    ImportRequested,
    Imported,
    Creating,
    Created,
    Updating,
    Updated,
    DeletionRequested,
    Deleting,
    Deleted,
}

impl ResourceState {
    pub const ALL: [ResourceState; 10] = [
        ResourceState::Initial,
        ResourceState::ImportRequested,
        ResourceState::Imported,
        ResourceState::Creating,
        ResourceState::Created,
        ResourceState::Updating,
        ResourceState::Updated,
        ResourceState::DeletionRequested,
        ResourceState::Deleting,
        ResourceState::Deleted,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceState::Initial => "Initial",
            ResourceState::ImportRequested => "ImportRequested",
            ResourceState::Imported => "Imported",
            ResourceState::Creating => "Creating",
            ResourceState::Created => "Created",
            ResourceState::Updating => "Updating",
            ResourceState::Updated => "Updated",
            ResourceState::DeletionRequested => "DeletionRequested",
            ResourceState::Deleting => "Deleting",
            ResourceState::Deleted => "Deleted",
        }
    }

    /// States in which the resource matches its desired state for this cycle
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ResourceState::Imported | ResourceState::Created | ResourceState::Updated
        )
    }

    /// States that are expected to change without a user edit
    #[must_use]
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            ResourceState::Creating
                | ResourceState::Updating
                | ResourceState::Deleting
                | ResourceState::DeletionRequested
        )
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted state name outside the known lifecycle set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported state {0:?}")]
pub struct UnsupportedState(pub String);

impl FromStr for ResourceState {
    type Err = UnsupportedState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnsupportedState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for state in ResourceState::ALL {
            assert_eq!(state.as_str().parse::<ResourceState>(), Ok(state));
            assert_eq!(state.to_string(), state.as_str());
        }
    }

    #[test]
    fn test_unknown_name_is_unsupported() {
        let err = "Paused".parse::<ResourceState>().unwrap_err();
        assert_eq!(err.to_string(), r#"unsupported state "Paused""#);

        let err = "".parse::<ResourceState>().unwrap_err();
        assert_eq!(err.to_string(), r#"unsupported state """#);
    }

    #[test]
    fn test_parsing_is_case_sensitive() {
        assert!("created".parse::<ResourceState>().is_err());
    }

    #[test]
    fn test_settled_and_transitional_are_disjoint() {
        for state in ResourceState::ALL {
            assert!(!(state.is_settled() && state.is_transitional()), "{state}");
        }
        assert!(ResourceState::Updated.is_settled());
        assert!(ResourceState::DeletionRequested.is_transitional());
        assert!(!ResourceState::Initial.is_settled());
        assert!(!ResourceState::Deleted.is_transitional());
    }
}
