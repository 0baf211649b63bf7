//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::ideas;
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;
use axum::{middleware, routing::post, Router};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ideas", post(ideas::generate_idea_handler))
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}
