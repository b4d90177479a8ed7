//! # Update Decision
//!
//! One gate, shared by every resource kind, deciding whether a settled resource
//! needs an external update call this pass.

use super::reapply::{should_reapply_at, ReapplyError};
use super::tracker::{compute_fingerprint, DependencyRef};
use crate::constants::STATE_TRACKER_ANNOTATION;
use crate::crd::StateObject;
use crate::state::{find_condition, READY_CONDITION, READY_REASON_ERROR, STATE_CONDITION};
use chrono::{DateTime, Utc};
use kube::ResourceExt;

/// Whether the spec moved, the last pass failed, or a periodic reapply is due
///
/// # Errors
///
/// Propagates reapply annotation validation errors.
pub fn should_update<K: StateObject>(obj: &K) -> Result<bool, ReapplyError> {
    should_update_at(obj, Utc::now())
}

/// [`should_update`] with an explicit clock
///
/// # Errors
///
/// Propagates reapply annotation validation errors.
pub fn should_update_at<K: StateObject>(obj: &K, now: DateTime<Utc>) -> Result<bool, ReapplyError> {
    let reapply_due = should_reapply_at(obj, now)?;
    Ok(generation_changed(obj) || ready_is_error(obj) || reapply_due)
}

/// [`should_update`], additionally true when the dependency fingerprint drifted
///
/// A resource with no recorded fingerprint counts as drifted.
///
/// # Errors
///
/// Propagates reapply annotation validation errors.
pub fn should_update_with_dependencies<K: StateObject>(
    obj: &K,
    dependencies: &[DependencyRef],
) -> Result<bool, ReapplyError> {
    Ok(should_update(obj)? || dependencies_changed(obj, dependencies))
}

#[must_use]
pub fn dependencies_changed<K: StateObject>(obj: &K, dependencies: &[DependencyRef]) -> bool {
    obj.annotations()
        .get(STATE_TRACKER_ANNOTATION)
        .is_none_or(|recorded| *recorded != compute_fingerprint(obj, dependencies))
}

fn generation_changed<K: StateObject>(obj: &K) -> bool {
    let observed = find_condition(obj.conditions(), STATE_CONDITION)
        .and_then(|c| c.observed_generation);
    observed != Some(obj.meta().generation.unwrap_or_default())
}

fn ready_is_error<K: StateObject>(obj: &K) -> bool {
    find_condition(obj.conditions(), READY_CONDITION)
        .is_some_and(|c| c.reason.as_deref() == Some(READY_REASON_ERROR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{REAPPLY_PERIOD_ANNOTATION, REAPPLY_TIMESTAMP_ANNOTATION};
    use crate::crd::{Condition, FlexCluster, FlexClusterSpec, FlexClusterStatus};
    use chrono::TimeDelta;

    fn cluster(generation: i64, observed: i64, ready_reason: &str) -> FlexCluster {
        let mut obj = FlexCluster::new("orders", FlexClusterSpec::default());
        obj.metadata.generation = Some(generation);
        obj.status = Some(FlexClusterStatus {
            conditions: vec![
                Condition {
                    r#type: STATE_CONDITION.to_string(),
                    status: "True".to_string(),
                    reason: Some("Created".to_string()),
                    observed_generation: Some(observed),
                    ..Condition::default()
                },
                Condition {
                    r#type: READY_CONDITION.to_string(),
                    status: "True".to_string(),
                    reason: Some(ready_reason.to_string()),
                    ..Condition::default()
                },
            ],
            v20250312: None,
        });
        obj
    }

    fn annotate(obj: &mut FlexCluster, key: &str, value: String) {
        obj.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(key.to_string(), value);
    }

    #[test]
    fn test_up_to_date() {
        assert!(!should_update(&cluster(2, 2, "Settled")).unwrap());
    }

    #[test]
    fn test_generation_changed() {
        assert!(should_update(&cluster(3, 2, "Settled")).unwrap());
    }

    #[test]
    fn test_no_state_condition_counts_as_changed() {
        let mut obj = FlexCluster::new("orders", FlexClusterSpec::default());
        obj.metadata.generation = Some(1);
        assert!(should_update(&obj).unwrap());
    }

    #[test]
    fn test_previous_error() {
        assert!(should_update(&cluster(2, 2, "Error")).unwrap());
    }

    #[test]
    fn test_reapply_due() {
        let now = Utc::now();
        let mut obj = cluster(2, 2, "Settled");
        annotate(&mut obj, REAPPLY_PERIOD_ANNOTATION, "1h".to_string());
        annotate(
            &mut obj,
            REAPPLY_TIMESTAMP_ANNOTATION,
            (now - TimeDelta::hours(2)).timestamp_millis().to_string(),
        );
        assert!(should_update_at(&obj, now).unwrap());

        annotate(
            &mut obj,
            REAPPLY_TIMESTAMP_ANNOTATION,
            now.timestamp_millis().to_string(),
        );
        assert!(!should_update_at(&obj, now).unwrap());
    }

    #[test]
    fn test_invalid_period_is_an_error() {
        let mut obj = cluster(2, 2, "Settled");
        annotate(&mut obj, REAPPLY_PERIOD_ANNOTATION, "soon".to_string());
        assert!(should_update(&obj).is_err());
    }

    #[test]
    fn test_dependency_drift() {
        let deps = vec![DependencyRef {
            kind: "Secret".to_string(),
            namespace: "shop".to_string(),
            name: "creds".to_string(),
            uid: "u1".to_string(),
            resource_version: "7".to_string(),
        }];
        let mut obj = cluster(2, 2, "Settled");
        assert!(dependencies_changed(&obj, &deps));

        let fingerprint = compute_fingerprint(&obj, &deps);
        annotate(&mut obj, STATE_TRACKER_ANNOTATION, fingerprint);
        assert!(!dependencies_changed(&obj, &deps));
        assert!(!should_update_with_dependencies(&obj, &deps).unwrap());

        let mut rotated = deps.clone();
        rotated[0].resource_version = "8".to_string();
        assert!(should_update_with_dependencies(&obj, &rotated).unwrap());
    }
}
