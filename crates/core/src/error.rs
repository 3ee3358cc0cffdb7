//! Core Error Types
//!
//! Defines the foundational error types used across the workspace engine.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The engine crate extends these with variants for storage, sandbox, and
//! embedding failures that require heavier dependencies.

use thiserror::Error;

/// Core error type for the workspace engine.
#[derive(Error, Debug)]
pub enum CoreError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse errors (manifests, symbol rules)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<regex::Error> for CoreError {
    fn from(err: regex::Error) -> Self {
        Self::Parse(format!("invalid pattern: {}", err))
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
