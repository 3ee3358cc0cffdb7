//! Error Handling
//!
//! Unified error types for the engine.
//! Uses thiserror for ergonomic error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::command::CommandResult;
use workspace_engine_core::CoreError;

/// Coarse error taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Timeout,
    PathViolation,
    Sandbox,
    Storage,
    Embedding,
    Cancelled,
    Config,
    Internal,
}

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from the core crate (tokenizers, manifests)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Process spawn or sandbox infrastructure errors
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// A path resolved outside its workspace root
    #[error("Path violation: {0}")]
    PathViolation(String),

    /// The command outlived its timeout and was killed
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout {
        timeout_ms: u64,
        partial: Box<CommandResult>,
    },

    /// The command was cancelled and killed
    #[error("Command cancelled")]
    Cancelled { partial: Box<CommandResult> },

    /// Embedding provider or pipeline errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a sandbox error
    pub fn sandbox(msg: impl Into<String>) -> Self {
        Self::Sandbox(msg.into())
    }

    /// Create a path violation error
    pub fn path_violation(msg: impl Into<String>) -> Self {
        Self::PathViolation(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Database(_) | AppError::Sqlite(_) => ErrorKind::Storage,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            AppError::Io(_) => ErrorKind::Sandbox,
            AppError::Serialization(_) => ErrorKind::Internal,
            AppError::Core(CoreError::Validation(_) | CoreError::Parse(_)) => ErrorKind::Validation,
            AppError::Core(CoreError::Io(_)) => ErrorKind::Sandbox,
            AppError::Core(_) => ErrorKind::Internal,
            AppError::Sandbox(_) => ErrorKind::Sandbox,
            AppError::PathViolation(_) => ErrorKind::PathViolation,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::Cancelled { .. } => ErrorKind::Cancelled,
            AppError::Embedding(_) => ErrorKind::Embedding,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Output captured before a timeout or cancellation, if any.
    pub fn partial_result(&self) -> Option<&CommandResult> {
        match self {
            AppError::Timeout { partial, .. } | AppError::Cancelled { partial } => Some(partial),
            _ => None,
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database(format!("Failed to get connection: {}", err))
    }
}

/// Convert AppError to a string suitable for response envelopes
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
