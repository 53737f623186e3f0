//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping
//! from the core taxonomy onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bookshelf_core::CoreError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core workflows.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            // Authentication failures: no detail leakage.
            ApiError::Core(CoreError::MissingCredential)
            | ApiError::Core(CoreError::InvalidCredential) => {
                (StatusCode::UNAUTHORIZED, "unauthorized".to_string())
            }
            ApiError::Core(CoreError::MalformedCredential) => {
                (StatusCode::NOT_ACCEPTABLE, "malformed credential".to_string())
            }

            // Conflicts: a retried sync or confirmation.
            ApiError::Core(CoreError::DuplicateUser) => {
                (StatusCode::CONFLICT, "user already exists".to_string())
            }
            ApiError::Core(CoreError::DuplicateResource) => {
                (StatusCode::CONFLICT, "book already exists".to_string())
            }

            ApiError::Core(CoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Core(CoreError::ObjectNotFound(key)) => (
                StatusCode::BAD_REQUEST,
                format!("no uploaded object at key {key}"),
            ),
            ApiError::Core(CoreError::Forbidden) => {
                (StatusCode::FORBIDDEN, "not an owner".to_string())
            }

            // Validation failures echo their message.
            ApiError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            ApiError::Core(CoreError::DeadlineExceeded(_)) => {
                error!("request deadline exceeded: {self}");
                (StatusCode::GATEWAY_TIMEOUT, "deadline exceeded".to_string())
            }

            // A pipeline-ordering bug. Log the detail, return nothing of it.
            ApiError::Core(CoreError::ContextCorruption(what)) => {
                error!("request context corrupted: {what}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }

            // Everything else is an opaque server fault.
            _ => {
                error!("internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": detail }))).into_response()
    }
}
