//! Forge API Server
//!
//! REST server for the IdeaForge synthesis pipeline.
//!
//! Author: hephaex@gmail.com

use forge_agent::{create_llm_client, IdeaAgent, IdeaAgentConfig};
use forge_api::{create_router, state::AppState};
use forge_core::AppConfig;
use forge_vector::build_search_stack;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().unwrap_or_default();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("forge_api={},tower_http=debug", config.logging.level).into()
    });
    if config.logging.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config.clone()));

    // Connect the backend stack; the server still starts (not ready)
    // when a backend is unavailable.
    match build_search_stack(&config).await {
        Ok(stack) => match create_llm_client(&config.llm) {
            Ok(llm) => {
                let agent = IdeaAgent::new(
                    stack.embedder,
                    stack.search,
                    llm,
                    IdeaAgentConfig::from_app_config(&config),
                );
                state.initialize_agent(Arc::new(agent)).await;
                tracing::info!("idea agent initialized");
            }
            Err(e) => tracing::warn!(error = %e, "LLM client unavailable, serving not-ready"),
        },
        Err(e) => tracing::warn!(error = %e, "search stack unavailable, serving not-ready"),
    }

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Forge API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
