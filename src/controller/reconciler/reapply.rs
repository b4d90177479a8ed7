//! # Reapply
//!
//! Time-based re-reconciliation driven by two annotations: a user-supplied
//! minimum period and the millisecond timestamp of the last reapply.

use super::client::ResourceClient;
use super::utils::annotation_path;
use super::validation::{parse_duration, InvalidDuration};
use crate::constants::{
    MIN_REAPPLY_PERIOD_SECS, REAPPLY_PERIOD_ANNOTATION, REAPPLY_TIMESTAMP_ANNOTATION,
};
use crate::crd::StateObject;
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use serde_json::json;
use std::num::ParseIntError;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ReapplyError {
    #[error(transparent)]
    InvalidPeriod(#[from] InvalidDuration),

    #[error("reapply period {value} is shorter than the minimum of {min_secs}s")]
    PeriodTooShort { value: String, min_secs: u64 },

    #[error("invalid reapply timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to patch reapply timestamp: {0}")]
    Patch(#[source] kube::Error),
}

/// Configured reapply period, `None` when the annotation is absent
///
/// # Errors
///
/// Returns an error when the value does not parse or is under 60 seconds.
pub fn reapply_period<K: ResourceExt>(obj: &K) -> Result<Option<Duration>, ReapplyError> {
    let Some(value) = obj.annotations().get(REAPPLY_PERIOD_ANNOTATION) else {
        return Ok(None);
    };

    let period = parse_duration(value)?;
    if period < Duration::from_secs(MIN_REAPPLY_PERIOD_SECS) {
        return Err(ReapplyError::PeriodTooShort {
            value: value.clone(),
            min_secs: MIN_REAPPLY_PERIOD_SECS,
        });
    }
    Ok(Some(period))
}

/// Time of the last reapply, `None` when the annotation is absent
///
/// # Errors
///
/// Returns an error when the value is not a millisecond count.
pub fn reapply_timestamp<K: ResourceExt>(obj: &K) -> Result<Option<DateTime<Utc>>, ReapplyError> {
    Ok(reapply_timestamp_millis(obj)?.and_then(DateTime::from_timestamp_millis))
}

fn reapply_timestamp_millis<K: ResourceExt>(obj: &K) -> Result<Option<i64>, ReapplyError> {
    obj.annotations()
        .get(REAPPLY_TIMESTAMP_ANNOTATION)
        .map(|value| {
            value
                .trim()
                .parse::<i64>()
                .map_err(|source| ReapplyError::InvalidTimestamp {
                    value: value.clone(),
                    source,
                })
        })
        .transpose()
}

/// Whether a periodic reapply is due now
///
/// # Errors
///
/// Propagates annotation validation errors.
pub fn should_reapply<K: ResourceExt>(obj: &K) -> Result<bool, ReapplyError> {
    should_reapply_at(obj, Utc::now())
}

/// Whether a periodic reapply is due at `now`
///
/// # Errors
///
/// Propagates annotation validation errors.
pub fn should_reapply_at<K: ResourceExt>(obj: &K, now: DateTime<Utc>) -> Result<bool, ReapplyError> {
    let Some(period) = reapply_period(obj)? else {
        return Ok(false);
    };
    let Some(timestamp) = reapply_timestamp_millis(obj)? else {
        return Ok(false);
    };
    Ok(now.timestamp_millis() >= due_millis(timestamp, period))
}

/// Record a reapply now if the current window has elapsed
///
/// Returns the delay until the next reapply is due, or zero when no period is
/// configured.
///
/// # Errors
///
/// Propagates annotation validation errors and the patch error.
pub async fn patch_reapply_timestamp<K: StateObject>(
    client: &dyn ResourceClient<K>,
    obj: &K,
) -> Result<Duration, ReapplyError> {
    patch_reapply_timestamp_at(client, obj, Utc::now()).await
}

/// [`patch_reapply_timestamp`] with an explicit clock
///
/// # Errors
///
/// Propagates annotation validation errors and the patch error.
pub async fn patch_reapply_timestamp_at<K: StateObject>(
    client: &dyn ResourceClient<K>,
    obj: &K,
    now: DateTime<Utc>,
) -> Result<Duration, ReapplyError> {
    let Some(period) = reapply_period(obj)? else {
        return Ok(Duration::ZERO);
    };

    let now_millis = now.timestamp_millis();
    if let Some(timestamp) = reapply_timestamp_millis(obj)? {
        let due = due_millis(timestamp, period);
        if now_millis < due {
            let remaining = u64::try_from(due - now_millis).unwrap_or_default();
            return Ok(Duration::from_millis(remaining));
        }
    }

    let patch: json_patch::Patch = serde_json::from_value(json!([{
        "op": "add",
        "path": annotation_path(REAPPLY_TIMESTAMP_ANNOTATION),
        "value": now_millis.to_string(),
    }]))
    .map_err(|e| ReapplyError::Patch(kube::Error::SerdeError(e)))?;

    client
        .json_patch(&obj.namespace().unwrap_or_default(), &obj.name_any(), patch)
        .await
        .map_err(ReapplyError::Patch)?;

    debug!(
        resource.name = %obj.name_any(),
        period_secs = period.as_secs(),
        "Recorded reapply timestamp"
    );
    crate::observability::metrics::increment_reapply_patches();
    Ok(period)
}

fn due_millis(timestamp: i64, period: Duration) -> i64 {
    let period_millis = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
    timestamp.saturating_add(period_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::client::MockResourceClient;
    use crate::crd::{FlexCluster, FlexClusterSpec};
    use chrono::TimeDelta;

    fn cluster(annotations: &[(&str, &str)]) -> FlexCluster {
        let mut obj = FlexCluster::new("orders", FlexClusterSpec::default());
        obj.metadata.namespace = Some("shop".to_string());
        obj.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        obj
    }

    fn millis(t: DateTime<Utc>) -> String {
        t.timestamp_millis().to_string()
    }

    mod reapply_period_tests {
        use super::*;

        #[test]
        fn test_valid_period() {
            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "2h")]);
            assert_eq!(
                reapply_period(&obj).unwrap(),
                Some(Duration::from_secs(7200))
            );
        }

        #[test]
        fn test_absent_period() {
            assert_eq!(reapply_period(&cluster(&[])).unwrap(), None);
        }

        #[test]
        fn test_invalid_period() {
            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "not-a-period")]);
            let err = reapply_period(&obj).unwrap_err();
            assert!(err.to_string().contains("invalid duration"), "{err}");
        }

        #[test]
        fn test_period_too_short() {
            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "30s")]);
            assert!(matches!(
                reapply_period(&obj),
                Err(ReapplyError::PeriodTooShort { .. })
            ));

            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "60s")]);
            assert_eq!(reapply_period(&obj).unwrap(), Some(Duration::from_secs(60)));
        }
    }

    mod reapply_timestamp_tests {
        use super::*;

        #[test]
        fn test_valid_timestamp() {
            let obj = cluster(&[(REAPPLY_TIMESTAMP_ANNOTATION, "1700000000123")]);
            let ts = reapply_timestamp(&obj).unwrap().unwrap();
            assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
        }

        #[test]
        fn test_invalid_timestamp() {
            let obj = cluster(&[(REAPPLY_TIMESTAMP_ANNOTATION, "yesterday")]);
            assert!(matches!(
                reapply_timestamp(&obj),
                Err(ReapplyError::InvalidTimestamp { .. })
            ));
        }
    }

    mod should_reapply_tests {
        use super::*;

        #[test]
        fn test_due_when_window_elapsed() {
            let now = Utc::now();
            let obj = cluster(&[
                (REAPPLY_PERIOD_ANNOTATION, "1h"),
                (REAPPLY_TIMESTAMP_ANNOTATION, millis(now - TimeDelta::hours(2)).as_str()),
            ]);
            assert!(should_reapply_at(&obj, now).unwrap());
        }

        #[test]
        fn test_due_exactly_at_boundary() {
            let now = Utc::now();
            let obj = cluster(&[
                (REAPPLY_PERIOD_ANNOTATION, "1h"),
                (REAPPLY_TIMESTAMP_ANNOTATION, millis(now - TimeDelta::hours(1)).as_str()),
            ]);
            assert!(should_reapply_at(&obj, now).unwrap());
        }

        #[test]
        fn test_not_due_in_future() {
            let now = Utc::now();
            let obj = cluster(&[
                (REAPPLY_PERIOD_ANNOTATION, "1h"),
                (REAPPLY_TIMESTAMP_ANNOTATION, millis(now + TimeDelta::hours(2)).as_str()),
            ]);
            assert!(!should_reapply_at(&obj, now).unwrap());
        }

        #[test]
        fn test_requires_both_annotations() {
            let now = Utc::now();
            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "1h")]);
            assert!(!should_reapply_at(&obj, now).unwrap());

            let obj = cluster(&[(REAPPLY_TIMESTAMP_ANNOTATION, millis(now - TimeDelta::days(3)).as_str())]);
            assert!(!should_reapply_at(&obj, now).unwrap());
        }

        #[test]
        fn test_propagates_validation_error() {
            let obj = cluster(&[
                (REAPPLY_PERIOD_ANNOTATION, "10s"),
                (REAPPLY_TIMESTAMP_ANNOTATION, "0"),
            ]);
            assert!(should_reapply(&obj).is_err());
        }
    }

    mod patch_reapply_timestamp_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_period_is_noop() {
            let mut client = MockResourceClient::<FlexCluster>::new();
            client.expect_json_patch().never();

            let delay = patch_reapply_timestamp(&client, &cluster(&[])).await.unwrap();
            assert_eq!(delay, Duration::ZERO);
        }

        #[tokio::test]
        async fn test_patches_and_returns_period() {
            let now = Utc::now();
            let expected = serde_json::json!([{
                "op": "add",
                "path": "/metadata/annotations/dbaas.microscaler.io~1reapply-timestamp",
                "value": now.timestamp_millis().to_string(),
            }]);

            let mut client = MockResourceClient::<FlexCluster>::new();
            client
                .expect_json_patch()
                .withf(move |ns, name, patch| {
                    ns == "shop"
                        && name == "orders"
                        && serde_json::to_value(patch).unwrap() == expected
                })
                .times(1)
                .returning(|_, _, _| Ok(FlexCluster::new("orders", FlexClusterSpec::default())));

            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "1h")]);
            let delay = patch_reapply_timestamp_at(&client, &obj, now).await.unwrap();
            assert_eq!(delay, Duration::from_secs(3600));
        }

        #[tokio::test]
        async fn test_window_not_elapsed_returns_remaining() {
            let now = Utc::now();
            let mut client = MockResourceClient::<FlexCluster>::new();
            client.expect_json_patch().never();

            let obj = cluster(&[
                (REAPPLY_PERIOD_ANNOTATION, "1h"),
                (REAPPLY_TIMESTAMP_ANNOTATION, millis(now - TimeDelta::minutes(45)).as_str()),
            ]);
            let delay = patch_reapply_timestamp_at(&client, &obj, now).await.unwrap();
            assert_eq!(delay, Duration::from_secs(15 * 60));
        }

        #[tokio::test]
        async fn test_patch_failure() {
            let mut client = MockResourceClient::<FlexCluster>::new();
            client
                .expect_json_patch()
                .returning(|_, _, _| Err(kube::Error::Service("patch rejected".into())));

            let obj = cluster(&[(REAPPLY_PERIOD_ANNOTATION, "1h")]);
            let err = patch_reapply_timestamp(&client, &obj).await.unwrap_err();
            assert!(matches!(err, ReapplyError::Patch(_)));
            assert!(err.to_string().starts_with("failed to patch reapply timestamp"));
        }
    }
}
