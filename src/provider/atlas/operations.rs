//! Flex cluster operations

use super::{handle_error_response, AtlasClient, FlexClusterCreate, FlexClusterDescription, FlexClusterUpdate};
use crate::observability::metrics;
use crate::provider::{ApiError, FlexClusterApi};
use async_trait::async_trait;
use reqwest::{Method, Response};
use std::time::Instant;
use tracing::{debug, Instrument};

impl AtlasClient {
    async fn send_timed(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, ApiError> {
        let start = Instant::now();
        let result = request.send().await;
        let success = matches!(&result, Ok(response) if response.status().is_success());
        metrics::record_api_request(operation, start.elapsed().as_secs_f64(), success);
        Ok(result?)
    }
}

fn cluster_path(group_id: &str, name: &str) -> String {
    format!("groups/{group_id}/flexClusters/{name}")
}

#[async_trait]
impl FlexClusterApi for AtlasClient {
    async fn create_flex_cluster(
        &self,
        group_id: &str,
        body: &FlexClusterCreate,
    ) -> Result<FlexClusterDescription, ApiError> {
        let span = tracing::debug_span!(
            "atlas.flex_cluster.create",
            group_id = group_id,
            cluster = %body.name
        );

        async move {
            let request = self
                .make_request(Method::POST, &format!("groups/{group_id}/flexClusters"))
                .header("Content-Type", super::ATLAS_MEDIA_TYPE)
                .json(body);
            let response = self.send_timed("create", request).await?;

            if !response.status().is_success() {
                return Err(handle_error_response(response, &body.name).await);
            }

            debug!("Flex cluster creation accepted");
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    async fn get_flex_cluster(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<FlexClusterDescription, ApiError> {
        let span = tracing::debug_span!("atlas.flex_cluster.get", group_id = group_id, cluster = name);

        async move {
            let request = self.make_request(Method::GET, &cluster_path(group_id, name));
            let response = self.send_timed("get", request).await?;

            if !response.status().is_success() {
                return Err(handle_error_response(response, name).await);
            }

            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    async fn update_flex_cluster(
        &self,
        group_id: &str,
        name: &str,
        body: &FlexClusterUpdate,
    ) -> Result<FlexClusterDescription, ApiError> {
        let span =
            tracing::debug_span!("atlas.flex_cluster.update", group_id = group_id, cluster = name);

        async move {
            let request = self
                .make_request(Method::PATCH, &cluster_path(group_id, name))
                .header("Content-Type", super::ATLAS_MEDIA_TYPE)
                .json(body);
            let response = self.send_timed("update", request).await?;

            if !response.status().is_success() {
                return Err(handle_error_response(response, name).await);
            }

            debug!("Flex cluster update accepted");
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    async fn delete_flex_cluster(&self, group_id: &str, name: &str) -> Result<(), ApiError> {
        let span =
            tracing::debug_span!("atlas.flex_cluster.delete", group_id = group_id, cluster = name);

        async move {
            let request = self.make_request(Method::DELETE, &cluster_path(group_id, name));
            let response = self.send_timed("delete", request).await?;

            if !response.status().is_success() {
                return Err(handle_error_response(response, name).await);
            }

            debug!("Flex cluster deletion accepted");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server::serve;
    use super::super::{ProviderSettingsCreate, ResourceTag};
    use crate::provider::{ApiConnector, ApiCredentials, AtlasConnector};
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer tok-123")
            && headers.get("accept").and_then(|v| v.to_str().ok())
                == Some(super::super::ATLAS_MEDIA_TYPE)
    }

    fn description(name: &str, state: &str) -> Value {
        json!({
            "id": "673a1b",
            "groupId": "5f1b2c",
            "name": name,
            "stateName": state,
            "mongoDBVersion": "8.0.3",
            "connectionStrings": {"standardSrv": format!("mongodb+srv://{name}.example.net")}
        })
    }

    fn api_router() -> Router {
        Router::new()
            .route(
                "/api/oauth/token",
                post(|| async { Json(json!({"access_token": "tok-123"})) }),
            )
            .route(
                "/api/atlas/v2/groups/{group}/flexClusters",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})));
                    }
                    let name = body["name"].as_str().unwrap_or_default().to_string();
                    (StatusCode::CREATED, Json(description(&name, "CREATING")))
                }),
            )
            .route(
                "/api/atlas/v2/groups/{group}/flexClusters/{name}",
                get(|headers: HeaderMap, Path((_, name)): Path<(String, String)>| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})));
                    }
                    if name == "missing" {
                        return (
                            StatusCode::NOT_FOUND,
                            Json(json!({
                                "detail": "No flex cluster named missing exists",
                                "errorCode": "CLUSTER_NOT_FOUND"
                            })),
                        );
                    }
                    if name == "broken" {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"detail": "Unexpected error"})),
                        );
                    }
                    (StatusCode::OK, Json(description(&name, "IDLE")))
                })
                .patch(|Path((_, name)): Path<(String, String)>, Json(body): Json<Value>| async move {
                    let mut updated = description(&name, "UPDATING");
                    updated["tags"] = body["tags"].clone();
                    (StatusCode::OK, Json(updated))
                })
                .delete(|Path((_, name)): Path<(String, String)>| async move {
                    if name == "missing" {
                        StatusCode::NOT_FOUND
                    } else {
                        StatusCode::ACCEPTED
                    }
                }),
            )
    }

    async fn client() -> Arc<dyn FlexClusterApi> {
        let base_url = serve(api_router()).await;
        AtlasConnector::new(base_url)
            .unwrap()
            .connect(&ApiCredentials::new("svc", "secret"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_description() {
        let api = client().await;
        let body = FlexClusterCreate {
            name: "orders".to_string(),
            provider_settings: ProviderSettingsCreate {
                backing_provider_name: "AWS".to_string(),
                region_name: "US_EAST_1".to_string(),
            },
            termination_protection_enabled: None,
            tags: vec![],
        };

        let created = api.create_flex_cluster("5f1b2c", &body).await.unwrap();
        assert_eq!(created.name.as_deref(), Some("orders"));
        assert_eq!(created.state_name.as_deref(), Some("CREATING"));
    }

    #[tokio::test]
    async fn test_get_idle_cluster() {
        let api = client().await;
        let cluster = api.get_flex_cluster("5f1b2c", "orders").await.unwrap();
        assert_eq!(cluster.state_name.as_deref(), Some("IDLE"));
        assert_eq!(cluster.mongo_db_version.as_deref(), Some("8.0.3"));
    }

    #[tokio::test]
    async fn test_get_missing_cluster_is_not_found() {
        let api = client().await;
        let err = api.get_flex_cluster("5f1b2c", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_carries_detail() {
        let api = client().await;
        let err = api.get_flex_cluster("5f1b2c", "broken").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Unexpected error");
    }

    #[tokio::test]
    async fn test_update_sends_tags() {
        let api = client().await;
        let body = FlexClusterUpdate {
            termination_protection_enabled: None,
            tags: vec![ResourceTag {
                key: "team".to_string(),
                value: "checkout".to_string(),
            }],
        };

        let updated = api
            .update_flex_cluster("5f1b2c", "orders", &body)
            .await
            .unwrap();
        assert_eq!(updated.tags, body.tags);
        assert!(updated.is_upserting());
    }

    #[tokio::test]
    async fn test_delete() {
        let api = client().await;
        api.delete_flex_cluster("5f1b2c", "orders").await.unwrap();
        assert!(api
            .delete_flex_cluster("5f1b2c", "missing")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
