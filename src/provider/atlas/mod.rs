//! # Atlas Flex Cluster REST Client
//!
//! REST implementation of the flex cluster operations of the Atlas Admin API
//! (resource version 2024-11-13).
//!
//! Authentication uses the OAuth 2.0 client-credentials grant: the service
//! account's client id and secret are exchanged for a short-lived bearer token
//! when the client is built. Tokens are held in zeroizing buffers.
//!
//! References:
//! - [Atlas Admin API v2](https://www.mongodb.com/docs/atlas/reference/api-resources-spec/v2/)

mod operations;
mod requests;
mod responses;

pub use requests::*;
pub use responses::{ConnectionStrings, FlexClusterDescription};

use super::{ApiConnector, ApiCredentials, ApiError, FlexClusterApi};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Versioned media type selecting the 2024-11-13 resource version
pub(crate) const ATLAS_MEDIA_TYPE: &str = "application/vnd.atlas.2024-11-13+json";

/// Error code the service reports for a missing flex cluster
const CLUSTER_NOT_FOUND: &str = "CLUSTER_NOT_FOUND";

/// Authenticated Atlas REST client
pub struct AtlasClient {
    http_client: Client,
    base_url: String,
    access_token: Zeroizing<String>,
}

impl std::fmt::Debug for AtlasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AtlasClient {
    /// Exchange `credentials` for an access token and build a client
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails or is rejected.
    pub async fn new(
        http_client: Client,
        base_url: &str,
        credentials: &ApiCredentials,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let access_token = Self::get_access_token(&http_client, &base_url, credentials).await?;

        Ok(Self {
            http_client,
            base_url,
            access_token,
        })
    }

    /// Fetch a bearer token through the client-credentials grant
    pub(crate) async fn get_access_token(
        http_client: &Client,
        base_url: &str,
        credentials: &ApiCredentials,
    ) -> Result<Zeroizing<String>, ApiError> {
        debug!(client_id = %credentials.client_id(), "Requesting access token");

        let response = http_client
            .post(format!("{base_url}/api/oauth/token"))
            .basic_auth(credentials.client_id(), Some(credentials.client_secret()))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, "access token").await);
        }

        let token: responses::TokenResponse = response.json().await?;
        Ok(Zeroizing::new(token.access_token.clone()))
    }

    /// Build an authenticated request against the admin API
    pub(crate) fn make_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api/atlas/v2/{}", self.base_url, path);

        self.http_client
            .request(method, url)
            .bearer_auth(self.access_token.as_str())
            .header("Accept", ATLAS_MEDIA_TYPE)
    }
}

/// Map a non-success response to an `ApiError`
///
/// `subject` names the requested resource in not-found errors.
pub(crate) async fn handle_error_response(response: Response, subject: &str) -> ApiError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let parsed = serde_json::from_str::<responses::ErrorResponse>(&text).ok();
    let error_code = parsed.as_ref().and_then(|e| e.error_code.clone());
    let message = parsed
        .and_then(|e| e.detail)
        .filter(|d| !d.is_empty())
        .unwrap_or(text);

    if status == StatusCode::NOT_FOUND || error_code.as_deref() == Some(CLUSTER_NOT_FOUND) {
        return ApiError::NotFound(subject.to_string());
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ApiError::Unauthorized {
            status: status.as_u16(),
            message,
        };
    }

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Connector building an `AtlasClient` per pass from the resolved credentials
#[derive(Debug, Clone)]
pub struct AtlasConnector {
    http_client: Client,
    base_url: String,
}

impl AtlasConnector {
    /// Create a connector for the API at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http_client = Client::builder().build()?;
        let base_url = base_url.into();
        info!("Initializing Atlas connector for {}", base_url);

        Ok(Self {
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl ApiConnector for AtlasConnector {
    async fn connect(
        &self,
        credentials: &ApiCredentials,
    ) -> Result<Arc<dyn FlexClusterApi>, ApiError> {
        let client = AtlasClient::new(self.http_client.clone(), &self.base_url, credentials).await?;
        Ok(Arc::new(client))
    }
}
