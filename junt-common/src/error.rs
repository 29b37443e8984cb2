//! Errors shared by the montage service and its storage layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of library, quota store and config operations
///
/// Pipeline stages report through `anyhow` and end up as job error strings;
/// this type is for the operations whose callers map errors onto HTTP
/// status codes.
#[derive(Error, Debug)]
pub enum Error {
    /// Library or usage-tracking table access failed
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Montage or clip file could not be copied, read or removed
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// `config.toml` unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown montage id or missing audio file (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad duration preset or a job that cannot be saved yet (HTTP 400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
