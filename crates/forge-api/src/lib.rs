//! Forge API - HTTP boundary for the idea synthesis pipeline
//!
//! Exposes the idea endpoint behind validation, rate limiting, and the
//! boundary error handler, plus the liveness/readiness/metrics surface.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{http::HeaderValue, routing::get, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the service
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::ideas::generate_idea_handler,
        handlers::health::health_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        handlers::ideas::IdeaRequest,
        handlers::ideas::IdeaResponse,
        handlers::ideas::ProjectSummary,
        handlers::ideas::IdeaMetadata,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        error::ErrorBody,
        error::ErrorKind,
    )),
    tags(
        (name = "ideas", description = "Retrieval-grounded idea synthesis"),
        (name = "health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(state: &Arc<AppState>) -> CorsLayer {
    if !state.config.server.cors_enabled {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        // No origins configured: keep the restrictive default.
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::list(origins))
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    }
}

/// Router wired to mock backends, for integration tests
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(testing::state_with_mock_agent(
        forge_core::AppConfig::default(),
    )))
}

#[cfg(feature = "test-utils")]
pub mod testing {
    //! Test wiring helpers shared by the integration suite

    use super::state::AppState;
    use forge_agent::testing::{MockEmbedding, MockLlm, MockSearch};
    use forge_agent::{IdeaAgent, IdeaAgentConfig};
    use forge_core::{AppConfig, ProjectRecord, SearchHit};
    use std::sync::Arc;

    /// Two showcase records mirroring real payloads
    pub fn sample_hits() -> Vec<SearchHit> {
        vec![
            SearchHit {
                id: "11111111-1111-1111-1111-111111111111".into(),
                score: 0.91,
                payload: ProjectRecord::new(
                    "Intent Pilot",
                    "Automates intent submission with session keys",
                    "https://showcase.example/intent-pilot",
                )
                .with_source_code("https://github.com/example/intent-pilot"),
            },
            SearchHit {
                id: "22222222-2222-2222-2222-222222222222".into(),
                score: 0.87,
                payload: ProjectRecord::new(
                    "Gasless Guild",
                    "Account-abstraction onboarding for DAOs",
                    "https://showcase.example/gasless-guild",
                ),
            },
        ]
    }

    /// State holding an agent wired to deterministic mock backends
    pub fn state_with_mock_agent(config: AppConfig) -> AppState {
        let agent = IdeaAgent::new(
            Arc::new(MockEmbedding::new(config.vector.dimension)),
            Arc::new(MockSearch::new(sample_hits())),
            Arc::new(MockLlm::new(
                "Title: Intent Autopilot\nPitch: An agent that batches user intents through 4337 paymasters.",
            )),
            IdeaAgentConfig::from_app_config(&config),
        );

        AppState::with_agent(config, Arc::new(agent))
    }
}
