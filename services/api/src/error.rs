//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping
//! from port errors to HTTP responses used by the handlers.

use crate::config::ConfigError;
use axum::http::StatusCode;
use study_planner_core::ports::PortError;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents an error related to the HTTP/WebSocket layer.
    #[error("Web Error: {0}")]
    Web(#[from] axum::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error half of every handler result.
pub type HandlerError = (StatusCode, String);

/// Logs a port error and turns it into a generic HTTP error.
pub fn port_to_http(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(what) => {
            tracing::debug!("{}: {}", context, what);
            (StatusCode::NOT_FOUND, "Not found".to_string())
        }
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{} failed", context))
        }
    }
}
