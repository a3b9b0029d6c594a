//! Error types for the memoization service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for configuration, key building and function calls.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache settings that cannot be represented
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An argument that cannot take part in a cache key
    #[error("Unhashable argument: {0}")]
    UnhashableArgument(String),

    /// No function registered under this name
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Malformed request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The wrapped function itself failed
    #[error("Call failed: {0}")]
    CallFailed(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::UnhashableArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::UnknownFunction(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::CallFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
