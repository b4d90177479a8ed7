//! # Configuration
//!
//! Controller and server configuration loaded from environment variables.
//!
//! - `controller`: reconciliation, backoff and external API settings
//! - `server`: HTTP metrics/probe server settings

pub mod controller;
pub mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared controller configuration
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Shared server configuration
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load both configurations from the environment and wrap them for sharing
#[must_use]
pub fn create_shared_config() -> (SharedControllerConfig, SharedServerConfig) {
    (
        Arc::new(RwLock::new(ControllerConfig::from_env())),
        Arc::new(RwLock::new(ServerConfig::from_env())),
    )
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_truthy_values() {
        for value in ["true", "TRUE", "1", "yes", "On", " true "] {
            assert!(parse_bool(value), "{value} should be true");
        }
        for value in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(value), "{value} should be false");
        }
    }

    #[test]
    fn test_env_var_or_default_falls_back_when_unset() {
        assert_eq!(
            env_var_or_default("DBAAS_TEST_SURELY_UNSET_VARIABLE", 42_u64),
            42
        );
        assert_eq!(
            env_var_or_default_str("DBAAS_TEST_SURELY_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
        assert!(env_var_or_default_bool(
            "DBAAS_TEST_SURELY_UNSET_VARIABLE",
            true
        ));
    }
}
