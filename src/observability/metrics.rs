//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `dbaas_controller_reconciliations_total` - Total number of reconcile passes
//! - `dbaas_controller_reconciliation_errors_total` - Total number of failed passes
//! - `dbaas_controller_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `dbaas_controller_state_transitions_total` - State transitions by target state
//! - `dbaas_controller_unsupported_states_total` - Passes aborted on an unreadable stored state
//! - `dbaas_controller_reapply_patches_total` - Reapply timestamps recorded
//! - `dbaas_controller_api_requests_total` - External API requests by operation
//! - `dbaas_controller_api_request_errors_total` - Failed external API requests by operation
//! - `dbaas_controller_api_request_duration_seconds` - Duration of external API requests

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dbaas_controller_reconciliations_total",
        "Total number of reconcile passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dbaas_controller_reconciliation_errors_total",
        "Total number of failed reconcile passes",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "dbaas_controller_reconciliation_duration_seconds",
            "Duration of reconcile passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static STATE_TRANSITIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "dbaas_controller_state_transitions_total",
            "Total number of lifecycle state transitions by target state",
        ),
        &["state"],
    )
    .expect("Failed to create STATE_TRANSITIONS_TOTAL metric - this should never happen")
});

pub(crate) static UNSUPPORTED_STATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dbaas_controller_unsupported_states_total",
        "Total number of passes aborted because the stored state is not supported",
    )
    .expect("Failed to create UNSUPPORTED_STATES_TOTAL metric - this should never happen")
});

static REAPPLY_PATCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "dbaas_controller_reapply_patches_total",
        "Total number of reapply timestamps recorded",
    )
    .expect("Failed to create REAPPLY_PATCHES_TOTAL metric - this should never happen")
});

static API_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "dbaas_controller_api_requests_total",
            "Total number of external API requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create API_REQUESTS_TOTAL metric - this should never happen")
});

static API_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "dbaas_controller_api_request_errors_total",
            "Total number of failed external API requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create API_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static API_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "dbaas_controller_api_request_duration_seconds",
            "Duration of external API requests in seconds by operation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create API_REQUEST_DURATION metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate registration"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(STATE_TRANSITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UNSUPPORTED_STATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REAPPLY_PATCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUEST_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_state_transition(state: &str) {
    STATE_TRANSITIONS_TOTAL.with_label_values(&[state]).inc();
}

pub fn increment_unsupported_states() {
    UNSUPPORTED_STATES_TOTAL.inc();
}

pub fn increment_reapply_patches() {
    REAPPLY_PATCHES_TOTAL.inc();
}

/// Record one external API request
pub fn record_api_request(operation: &str, duration: f64, success: bool) {
    API_REQUESTS_TOTAL.with_label_values(&[operation]).inc();
    API_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
    if !success {
        API_REQUEST_ERRORS_TOTAL
            .with_label_values(&[operation])
            .inc();
    }
}
