// API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure a handler can return. Each variant maps to one status code
/// and a `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// The request body could not be extracted (malformed JSON, broken
    /// multipart, oversized upload).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    NotFound(String),

    /// The transcribe/diarize/classify pipeline failed.
    #[error("failed to process standup: {0}")]
    Processing(anyhow::Error),

    #[error("{0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Processing(e) => {
                error!("Error processing standup: {e:#}");
                json!({ "error": "Failed to process standup", "details": format!("{e:#}") })
            }
            ApiError::Internal(e) => {
                error!("Internal error: {e:#}");
                json!({ "error": "Internal server error", "details": format!("{e:#}") })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
