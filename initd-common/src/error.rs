//! Common error types for initd

use thiserror::Error;

/// Common result type for initd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across initd crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Initialization failed before any configuration was loaded
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
