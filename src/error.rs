//! Error types for the media cache
//!
//! `MediaError` is the per-key failure taxonomy recorded on cache entries.
//! `ApiError` is what the admin HTTP surface returns.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// == Media Error Enum ==
/// Failure of a single media load.
///
/// Carried inside `LoadState::Failed`, so it is cheap to clone and compares
/// structurally. `Cancelled` is never recorded on an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MediaError {
    /// The key is not a parseable URL
    #[error("Invalid media key: {0}")]
    InvalidKey(String),

    /// Connection-level failure before a status was received
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Server answered with a non-2xx status
    #[error("Bad response status: {0}")]
    BadResponse(u16),

    /// Image bytes could not be decoded
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Video session reported an error (unsupported format, probe failed, ...)
    #[error("Session failure: {0}")]
    SessionFailure(String),

    /// Fetch or readiness wait exceeded its deadline (milliseconds)
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// The load was abandoned by `clear()` or eviction
    #[error("Load cancelled")]
    Cancelled,
}

impl MediaError {
    /// Short machine-readable label, used in logs and stats.
    pub fn label(&self) -> &'static str {
        match self {
            MediaError::InvalidKey(_) => "invalid_key",
            MediaError::TransportFailure(_) => "transport_failure",
            MediaError::BadResponse(_) => "bad_response",
            MediaError::DecodeFailure(_) => "decode_failure",
            MediaError::SessionFailure(_) => "session_failure",
            MediaError::Timeout(_) => "timeout",
            MediaError::Cancelled => "cancelled",
        }
    }
}

// == API Error Enum ==
/// Error type for the admin HTTP surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key has no cached content
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin surface.
pub type Result<T> = std::result::Result<T, ApiError>;
