//! Idea synthesis handlers
//!
//! Author: hephaex@gmail.com

use crate::error::{ApiError, ErrorKind};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use forge_core::ProjectRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;
use validator::Validate;

/// Longest accepted prize description, in characters
const MAX_PRIZE_CHARS: usize = 2000;

/// Idea request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IdeaRequest {
    /// Free-text prize or topic description
    #[validate(length(min = 1, max = 2000))]
    #[schema(example = "Best use of account abstraction for onchain automation")]
    pub prize: String,
}

/// One cited neighbor in the response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[schema(example = "Intent Pilot")]
    pub title: String,

    #[schema(example = "Automates intent submission with session keys")]
    pub description: String,

    #[schema(example = "https://showcase.example/intent-pilot")]
    pub link: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_its_made: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
}

impl From<ProjectRecord> for ProjectSummary {
    fn from(record: ProjectRecord) -> Self {
        Self {
            title: record.title,
            description: record.description,
            link: record.link,
            how_its_made: record.how_its_made,
            source_code: record.source_code,
        }
    }
}

/// Request metadata in the response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdeaMetadata {
    /// Wall-clock time spent on the request
    #[schema(example = 1250)]
    pub processing_time_ms: u64,

    /// Number of cited neighbors
    #[schema(example = 5)]
    pub refs_count: usize,
}

/// Idea response body
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdeaResponse {
    /// Synthesized idea text
    #[schema(example = "Title: Intent Autopilot\nPitch: An agent that batches user intents.")]
    pub idea: String,

    /// Cited neighbors, best match first
    pub similar_projects: Vec<ProjectSummary>,

    pub metadata: IdeaMetadata,
}

/// Handle idea synthesis requests
#[utoipa::path(
    post,
    path = "/api/v1/ideas",
    tag = "ideas",
    request_body = IdeaRequest,
    responses(
        (status = 200, description = "Idea synthesized", body = IdeaResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
        (status = 403, description = "Endpoint disabled", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorBody),
        (status = 500, description = "Backend failure", body = crate::error::ErrorBody),
        (status = 504, description = "Backend timeout", body = crate::error::ErrorBody)
    )
)]
pub async fn generate_idea_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdeaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.increment_requests();
    let start = Instant::now();

    if !state.config.server.ideas_enabled {
        return Err(ApiError::authorization(
            "Idea generation is disabled in this environment.",
        ));
    }

    req.validate()
        .map_err(|e| ApiError::validation(format!("Invalid request: {e}")))?;

    let prize = sanitize_prize(&req.prize);
    if prize.is_empty() {
        return Err(ApiError::validation("prize must not be empty or whitespace"));
    }
    if prize.chars().count() > MAX_PRIZE_CHARS {
        return Err(ApiError::validation(format!(
            "prize must be at most {MAX_PRIZE_CHARS} characters"
        )));
    }

    let Some(agent) = state.get_agent().await else {
        return Err(ApiError::new(
            ErrorKind::Unknown,
            "The idea agent is not initialized.",
        ));
    };

    match agent.generate_idea_from_prize(&prize).await {
        Ok(result) => {
            let refs_count = result.similar_projects.len();
            tracing::info!(
                refs = refs_count,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "idea request served"
            );

            let response = IdeaResponse {
                idea: result.content,
                similar_projects: result
                    .similar_projects
                    .into_iter()
                    .map(ProjectSummary::from)
                    .collect(),
                metadata: IdeaMetadata {
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    refs_count,
                },
            };

            Ok((StatusCode::OK, Json(response)))
        }
        Err(err) => {
            let api_err = ApiError::from_forge(err, state.config.server.expose_error_details);
            tracing::error!(
                kind = ?api_err.kind,
                error = %api_err.internal_detail(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "idea request failed"
            );
            Err(api_err)
        }
    }
}

/// Trim and drop control characters before the text reaches the agent
fn sanitize_prize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect()
}
