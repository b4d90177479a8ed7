//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Annotation keys and the finalizer marker are part of the persisted contract
//! with existing resources and must not change between releases. Numeric values
//! are defaults and can be overridden via environment variables where applicable.

/// Prefix shared by every annotation the controller reads or writes
pub const ANNOTATION_PREFIX: &str = "dbaas.microscaler.io/";

/// Annotation holding the state fingerprint of the last applied pass
pub const STATE_TRACKER_ANNOTATION: &str = "dbaas.microscaler.io/state-tracker";

/// Annotation holding the last reapply time in milliseconds since the Unix epoch
pub const REAPPLY_TIMESTAMP_ANNOTATION: &str = "dbaas.microscaler.io/reapply-timestamp";

/// User-supplied minimum interval between periodic reapplies
pub const REAPPLY_PERIOD_ANNOTATION: &str = "dbaas.microscaler.io/reapply-period";

/// Any annotation key with this prefix routes an Initial resource to import
pub const EXTERNAL_ANNOTATION_PREFIX: &str = "dbaas.microscaler.io/external-";

/// External name of a resource being imported
pub const EXTERNAL_NAME_ANNOTATION: &str = "dbaas.microscaler.io/external-name";

/// External group (project) id of a resource being imported
pub const EXTERNAL_GROUP_ID_ANNOTATION: &str = "dbaas.microscaler.io/external-group-id";

/// Reconciliation policy annotation
pub const RECONCILIATION_POLICY_ANNOTATION: &str = "dbaas.microscaler.io/reconciliation-policy";

/// Reconciliation policy value that disables handler dispatch
pub const RECONCILIATION_POLICY_SKIP: &str = "skip";

/// Resource deletion policy annotation (`keep` or `delete`)
pub const RESOURCE_POLICY_ANNOTATION: &str = "dbaas.microscaler.io/resource-policy";

pub const RESOURCE_POLICY_KEEP: &str = "keep";

pub const RESOURCE_POLICY_DELETE: &str = "delete";

/// Finalizer blocking removal until external cleanup completes
pub const FINALIZER: &str = "dbaas.microscaler.io/finalizer";

/// Field manager for server-side apply of annotations and status fields
pub const FIELD_MANAGER: &str = "dbaas-state-controller";

/// Field manager owning `status.conditions`
///
/// Must differ from `FIELD_MANAGER`: an apply releases every field its manager
/// owned but omitted from the body.
pub const CONDITIONS_FIELD_MANAGER: &str = "dbaas-state-controller-conditions";

/// Minimum accepted reapply period (seconds)
pub const MIN_REAPPLY_PERIOD_SECS: u64 = 60;

/// Default requeue after a pass that lands on a transitional state (seconds)
pub const DEFAULT_TRANSITION_REQUEUE_SECS: u64 = 10;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default Fibonacci backoff starting value for failed passes (seconds)
pub const DEFAULT_BACKOFF_START_SECS: u64 = 5;

/// Default Fibonacci backoff maximum value for failed passes (seconds)
/// Also used as the requeue for resources whose stored state is unreadable
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default name of the operator-wide API credentials secret
pub const DEFAULT_GLOBAL_SECRET_NAME: &str = "dbaas-operator-api-key";

/// Default namespace of the operator-wide API credentials secret
pub const DEFAULT_GLOBAL_SECRET_NAMESPACE: &str = "dbaas-system";

/// Default base URL of the external database-service API
pub const DEFAULT_API_BASE_URL: &str = "https://cloud.mongodb.com";
