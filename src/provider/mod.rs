//! # Provider Modules
//!
//! Clients for the external database-service API.
//!
//! Handlers talk to the service through the `FlexClusterApi` trait. An
//! `ApiConnector` turns service account credentials into an authenticated
//! client, so each pass uses the credentials currently stored in its Secret.

pub mod atlas;

pub use atlas::{
    AtlasClient, AtlasConnector, FlexClusterCreate, FlexClusterDescription, FlexClusterUpdate,
};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
use mockall::automock;

/// External API failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication failed (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Service account credentials read from a connection Secret
///
/// Wiped from memory on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiCredentials {
    client_id: String,
    client_secret: String,
}

impl ApiCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Flex cluster operations of the external service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FlexClusterApi: Send + Sync {
    async fn create_flex_cluster(
        &self,
        group_id: &str,
        body: &FlexClusterCreate,
    ) -> Result<FlexClusterDescription, ApiError>;

    async fn get_flex_cluster(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<FlexClusterDescription, ApiError>;

    async fn update_flex_cluster(
        &self,
        group_id: &str,
        name: &str,
        body: &FlexClusterUpdate,
    ) -> Result<FlexClusterDescription, ApiError>;

    async fn delete_flex_cluster(&self, group_id: &str, name: &str) -> Result<(), ApiError>;
}

/// Builds an authenticated API client from credentials
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &ApiCredentials,
    ) -> Result<Arc<dyn FlexClusterApi>, ApiError>;
}
