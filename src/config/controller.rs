//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_START_SECS,
    DEFAULT_GLOBAL_SECRET_NAME, DEFAULT_GLOBAL_SECRET_NAMESPACE, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; empty watches all namespaces
    pub watch_namespace: String,
    /// Enable periodic reapply driven by the reapply-period annotation
    pub reapply_support: bool,
    /// Keep external resources on deletion unless the resource policy says otherwise
    pub deletion_protection: bool,
    /// Fibonacci backoff starting value after a failed pass (seconds)
    pub backoff_start_secs: u64,
    /// Fibonacci backoff cap after repeated failures (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Name of the operator-wide API credentials secret
    pub global_secret_name: String,
    /// Namespace of the operator-wide API credentials secret
    pub global_secret_namespace: String,
    /// Base URL of the external database-service API
    pub api_base_url: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: String::new(),
            reapply_support: true,
            deletion_protection: false,
            backoff_start_secs: DEFAULT_BACKOFF_START_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            global_secret_name: DEFAULT_GLOBAL_SECRET_NAME.to_string(),
            global_secret_namespace: DEFAULT_GLOBAL_SECRET_NAMESPACE.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            watch_namespace: env_var_or_default_str("WATCH_NAMESPACE", ""),
            reapply_support: env_var_or_default_bool("REAPPLY_SUPPORT", true),
            deletion_protection: env_var_or_default_bool("DELETION_PROTECTION", false),
            backoff_start_secs: env_var_or_default(
                "BACKOFF_START_SECS",
                DEFAULT_BACKOFF_START_SECS,
            ),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            global_secret_name: env_var_or_default_str(
                "GLOBAL_SECRET_NAME",
                DEFAULT_GLOBAL_SECRET_NAME,
            ),
            global_secret_namespace: env_var_or_default_str(
                "GLOBAL_SECRET_NAMESPACE",
                DEFAULT_GLOBAL_SECRET_NAMESPACE,
            ),
            api_base_url: env_var_or_default_str("API_BASE_URL", DEFAULT_API_BASE_URL),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Namespace filter for the watch, `None` meaning cluster-wide
    #[must_use]
    pub fn namespace_filter(&self) -> Option<&str> {
        let ns = self.watch_namespace.trim();
        (!ns.is_empty()).then_some(ns)
    }

    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_filter() {
        let mut config = ControllerConfig::default();
        assert_eq!(config.namespace_filter(), None);

        config.watch_namespace = "  ".to_string();
        assert_eq!(config.namespace_filter(), None);

        config.watch_namespace = "databases".to_string();
        assert_eq!(config.namespace_filter(), Some("databases"));
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert!(config.reapply_support);
        assert!(!config.deletion_protection);
        assert_eq!(config.backoff_max_duration(), Duration::from_secs(300));
    }
}
