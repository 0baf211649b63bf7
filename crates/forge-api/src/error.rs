//! Boundary error handling
//!
//! The single place where typed pipeline errors become HTTP statuses and
//! user-safe messages. Internal error text is logged, never forwarded,
//! unless the development debug flag is set.
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use forge_core::ForgeError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of externally visible error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authorization,
    RateLimit,
    Timeout,
    Embedding,
    VectorSearch,
    Parse,
    Unknown,
}

impl ErrorKind {
    /// Fixed HTTP status for the kind
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation | Self::Parse => StatusCode::BAD_REQUEST,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Embedding | Self::VectorSearch | Self::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// User-safe default message for the kind
    fn user_message(&self) -> &'static str {
        match self {
            Self::Validation => "The request is invalid.",
            Self::Authorization => "This operation is not permitted.",
            Self::RateLimit => "Too many requests. Please slow down.",
            Self::Timeout => "An upstream call took too long to respond.",
            Self::Embedding => "The embedding backend failed to process the request.",
            Self::VectorSearch => "The project search backend failed.",
            Self::Parse => "A response payload failed safety validation.",
            Self::Unknown => "An internal error occurred.",
        }
    }

    /// Remediation hints shown to the caller
    fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            Self::Validation => Some(vec![
                "Provide a non-empty prize description of at most 2000 characters.".to_string(),
            ]),
            Self::RateLimit => Some(vec![
                "Retry after the time given in the X-RateLimit-Reset header.".to_string(),
            ]),
            Self::Timeout | Self::Embedding | Self::VectorSearch => {
                Some(vec!["Retry with exponential backoff.".to_string()])
            }
            _ => None,
        }
    }
}

/// Failure response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// User-safe message
    pub error: String,

    /// Taxonomy kind
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    /// When the failure was produced
    pub timestamp: DateTime<Utc>,

    /// Remediation hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,

    /// Internal detail, present only in development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind,
            timestamp: Utc::now(),
            suggestions: kind.suggestions(),
            details: None,
        }
    }
}

/// A classified failure on its way out of the API
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    message: String,
    internal: Option<String>,
    expose_details: bool,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal: None,
            expose_details: false,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::Validation,
            internal: Some(message.clone()),
            message,
            expose_details: false,
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Classify a pipeline error. The internal text is kept for logging and
    /// is only serialized when `expose_details` is set.
    pub fn from_forge(err: ForgeError, expose_details: bool) -> Self {
        let kind = match &err {
            ForgeError::Validation(_) => ErrorKind::Validation,
            ForgeError::Authorization(_) => ErrorKind::Authorization,
            ForgeError::Timeout { .. } => ErrorKind::Timeout,
            ForgeError::Embedding(_) => ErrorKind::Embedding,
            ForgeError::VectorDb(_) => ErrorKind::VectorSearch,
            ForgeError::Parse(_) => ErrorKind::Parse,
            ForgeError::Llm(_) | ForgeError::Config(_) | ForgeError::Other(_) => ErrorKind::Unknown,
        };

        let message = match &err {
            // These two carry text we wrote ourselves, safe to surface.
            ForgeError::Validation(msg) | ForgeError::Authorization(msg) => msg.clone(),
            _ => kind.user_message().to_string(),
        };

        Self {
            kind,
            message,
            internal: Some(err.to_string()),
            expose_details,
        }
    }

    /// Internal error text for logging
    pub fn internal_detail(&self) -> &str {
        self.internal.as_deref().unwrap_or(&self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = ErrorBody::new(self.kind, self.message);
        if self.expose_details {
            body.details = self.internal;
        }
        (self.kind.status(), Json(body)).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================
