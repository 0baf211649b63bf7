//! API Integration Tests
//!
//! The idea route is exercised against deterministic mock backends; no
//! network or database is required.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use forge_api::state::AppState;
use forge_api::testing::{sample_hits, state_with_mock_agent};
use forge_api::{create_router, create_router_for_testing};
use forge_core::AppConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["agent_initialized"], true);
}

#[tokio::test]
async fn test_readiness_without_agent_is_503() {
    let app = create_router(Arc::new(AppState::new(AppConfig::default())));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert!(json["uptime_seconds"].is_number());
    assert!(json["total_requests"].is_number());
}

// =============================================================================
// Idea API Tests
// =============================================================================

#[tokio::test]
async fn test_idea_endpoint_success() {
    let app = create_router_for_testing();

    let request = create_json_request(
        "POST",
        "/api/v1/ideas",
        Some(json!({
            "prize": "Build an onchain automation agent leveraging account abstraction and intents."
        })),
    );

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Limiter was consulted, so the standard headers accompany success.
    assert!(response.headers().contains_key("X-RateLimit-Limit"));
    assert!(response.headers().contains_key("X-RateLimit-Remaining"));
    assert!(response.headers().contains_key("X-RateLimit-Reset"));

    let json = response_json(response).await;

    assert!(json["idea"].as_str().unwrap().contains("Title:"));
    let similar = json["similarProjects"].as_array().unwrap();
    assert_eq!(similar.len(), 2);
    for project in similar {
        assert!(project["title"].is_string());
        assert!(project["description"].is_string());
        assert!(project["link"].is_string());
    }
    assert_eq!(json["metadata"]["refsCount"], 2);
    assert!(json["metadata"]["processingTimeMs"].is_number());
}

#[tokio::test]
async fn test_idea_endpoint_empty_prize() {
    let app = create_router_for_testing();

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": ""})));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["type"], "VALIDATION");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_idea_endpoint_whitespace_prize() {
    let app = create_router_for_testing();

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "   \t "})));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["type"], "VALIDATION");
}

#[tokio::test]
async fn test_idea_endpoint_oversize_prize() {
    let app = create_router_for_testing();

    let request = create_json_request(
        "POST",
        "/api/v1/ideas",
        Some(json!({"prize": "x".repeat(5000)})),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["type"], "VALIDATION");
    assert!(json["suggestions"].is_array());
}

#[tokio::test]
async fn test_idea_endpoint_disabled_is_forbidden() {
    let mut config = AppConfig::default();
    config.server.ideas_enabled = false;
    let app = create_router(Arc::new(state_with_mock_agent(config)));

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "anything"})));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = response_json(response).await;
    assert_eq!(json["type"], "AUTHORIZATION");
}

// =============================================================================
// Rate Limit Tests
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_after_window_budget() {
    let mut config = AppConfig::default();
    config.rate_limit.max_requests = 2;
    let app = create_router(Arc::new(state_with_mock_agent(config)));

    for _ in 0..2 {
        let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "go"})));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "go"})));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");

    let json = response_json(response).await;
    assert_eq!(json["type"], "RATE_LIMIT");
    assert!(json["error"].as_str().unwrap().contains("Rate limit exceeded"));
}

#[tokio::test]
async fn test_rate_limit_keys_are_per_caller() {
    let mut config = AppConfig::default();
    config.rate_limit.max_requests = 1;
    let app = create_router(Arc::new(state_with_mock_agent(config)));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ideas")
        .header("Content-Type", "application/json")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::from(json!({"prize": "go"}).to_string()))
        .unwrap();
    assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);

    // Different caller still has budget.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ideas")
        .header("Content-Type", "application/json")
        .header("x-forwarded-for", "198.51.100.8")
        .body(Body::from(json!({"prize": "go"}).to_string()))
        .unwrap();
    assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);

    // First caller is out of budget.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ideas")
        .header("Content-Type", "application/json")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::from(json!({"prize": "go"}).to_string()))
        .unwrap();
    assert_eq!(
        app.oneshot(request).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

// =============================================================================
// Error Boundary Tests
// =============================================================================

mod failing_backend {
    use async_trait::async_trait;
    use forge_core::{SearchHit, VectorDbError};
    use forge_vector::{SearchParams, VectorSearch};

    pub struct FailingSearch;

    #[async_trait]
    impl VectorSearch for FailingSearch {
        async fn search(
            &self,
            _collection: &str,
            _params: SearchParams,
        ) -> Result<Vec<SearchHit>, VectorDbError> {
            Err(VectorDbError::Search(
                "grpc channel to qdrant:6334 unreachable".into(),
            ))
        }
    }
}

fn state_with_failing_search(config: AppConfig) -> AppState {
    use forge_agent::testing::{MockEmbedding, MockLlm};
    use forge_agent::{IdeaAgent, IdeaAgentConfig};

    let agent = IdeaAgent::new(
        Arc::new(MockEmbedding::new(config.vector.dimension)),
        Arc::new(failing_backend::FailingSearch),
        Arc::new(MockLlm::new("unused")),
        IdeaAgentConfig::from_app_config(&config),
    );

    AppState::with_agent(config, Arc::new(agent))
}

#[tokio::test]
async fn test_backend_failure_maps_to_vector_search_kind() {
    let app = create_router(Arc::new(state_with_failing_search(AppConfig::default())));

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "go"})));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = response_json(response).await;
    assert_eq!(json["type"], "VECTOR_SEARCH");
    // Transport internals never reach the caller outside debug mode.
    assert!(json.get("details").is_none());
    assert!(!json["error"].as_str().unwrap().contains("qdrant:6334"));
}

#[tokio::test]
async fn test_debug_mode_exposes_details() {
    let mut config = AppConfig::default();
    config.server.expose_error_details = true;
    let app = create_router(Arc::new(state_with_failing_search(config)));

    let request = create_json_request("POST", "/api/v1/ideas", Some(json!({"prize": "go"})));
    let response = app.oneshot(request).await.unwrap();

    let json = response_json(response).await;
    assert_eq!(json["type"], "VECTOR_SEARCH");
    assert!(json["details"].as_str().unwrap().contains("unreachable"));
}

// =============================================================================
// OpenAPI Tests
// =============================================================================

#[tokio::test]
async fn test_openapi_spec_available() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert!(json["openapi"].is_string());
    assert!(json["paths"]["/api/v1/ideas"].is_object());
}

// Shared helper exercised by the mock wiring itself
#[test]
fn test_sample_hits_shape() {
    let hits = sample_hits();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
}
