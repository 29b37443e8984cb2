//! Error types for junt-montage
//!
//! Every handler error renders as `{"error": {"code", "message"}}`;
//! quota denials also carry the caller's usage.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::UsageInfo;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Anonymous quota used up (429)
    #[error("Montage limit reached ({} of {})", .usage.montage_count, .usage.limit)]
    QuotaExceeded {
        usage: UsageInfo,
        session_id: String,
    },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// junt-common error
    #[error("Common error: {0}")]
    Common(junt_common::Error),
}

impl From<junt_common::Error> for ApiError {
    fn from(err: junt_common::Error) -> Self {
        match err {
            junt_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            junt_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::QuotaExceeded { usage, session_id } => {
                let body = Json(json!({
                    "error": {
                        "code": "QUOTA_EXCEEDED",
                        "message": format!(
                            "You've used {} of {} free montages. Please try again later.",
                            usage.montage_count, usage.limit
                        ),
                    },
                    "usage": usage,
                    "session_id": session_id,
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        tracing::debug!(status = status.as_u16(), code = error_code, "Request failed: {}", message);

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
