//! Error types for scribe-backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::services::{LibraryError, PipelineError, ServiceHealth, StoreError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A job for the key is still running (409)
    #[error("Already processing {0}")]
    AlreadyProcessing(String),

    /// One or more model backends are down (503)
    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        services: Vec<ServiceHealth>,
    },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::AlreadyProcessing(key) => ApiError::AlreadyProcessing(key),
            PipelineError::ServiceUnavailable { summary, services } => ApiError::ServiceUnavailable {
                message: format!("Model services not available: {}", summary),
                services,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidKey(key) => ApiError::BadRequest(format!("Invalid resource key: {}", key)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::InvalidName(_) => ApiError::BadRequest(e.to_string()),
            LibraryError::NotFound(_) | LibraryError::DirectoryMissing(_) => {
                ApiError::NotFound(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest", msg, None),
            ApiError::AlreadyProcessing(key) => (
                StatusCode::CONFLICT,
                "AlreadyProcessing",
                format!("Already processing {}", key),
                None,
            ),
            ApiError::ServiceUnavailable { message, services } => {
                let details: Map<String, Value> = services
                    .into_iter()
                    .map(|s| (s.service, s.detail))
                    .collect();
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ServiceUnavailable",
                    message,
                    Some(Value::Object(details)),
                )
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal", msg, None),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %message, "Request failed");
        }

        let mut body = json!({
            "error": error_code,
            "message": message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
