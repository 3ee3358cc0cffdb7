//! Embedding Provider Abstraction Layer
//!
//! Defines the async `EmbeddingProvider` trait and supporting types for
//! pluggable embedding backends. Remote (OpenAI-compatible) and local
//! (feature hashing) backends implement the same interface, so the
//! embedding service never knows which one it is talking to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::AppError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingError {
    /// Authentication failed (invalid or missing API key).
    AuthenticationFailed { message: String },
    /// The requested model was not found or is not available.
    ModelNotFound { model: String },
    /// The provider is not reachable.
    ProviderUnavailable { message: String },
    /// The input text exceeds the provider's limit.
    InputTooLong { message: String },
    /// A network or connection error occurred.
    NetworkError { message: String },
    /// The provider returned an unexpected or unparseable response.
    ParseError { message: String },
    /// The provider returned an HTTP error.
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Rate limit exceeded.
    RateLimited { message: String },
    /// Configuration is invalid or incomplete.
    InvalidConfig { message: String },
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailed { message } => {
                write!(f, "authentication failed: {}", message)
            }
            Self::ModelNotFound { model } => write!(f, "model not found: {}", model),
            Self::ProviderUnavailable { message } => {
                write!(f, "provider unavailable: {}", message)
            }
            Self::InputTooLong { message } => write!(f, "input too long: {}", message),
            Self::NetworkError { message } => write!(f, "network error: {}", message),
            Self::ParseError { message } => write!(f, "parse error: {}", message),
            Self::ServerError { message, status } => {
                if let Some(code) = status {
                    write!(f, "server error (HTTP {}): {}", code, message)
                } else {
                    write!(f, "server error: {}", message)
                }
            }
            Self::RateLimited { message } => write!(f, "rate limited: {}", message),
            Self::InvalidConfig { message } => write!(f, "invalid config: {}", message),
        }
    }
}

impl std::error::Error for EmbeddingError {}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        AppError::embedding(err.to_string())
    }
}

/// Convenience alias for embedding operation results.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

// ---------------------------------------------------------------------------
// Provider type enum
// ---------------------------------------------------------------------------

/// Identifies the embedding backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embedding models or any OpenAI-compatible endpoint.
    #[serde(rename = "open_ai")]
    OpenAI,
    /// Local feature hashing (no network, deterministic).
    #[default]
    Hashing,
}

impl fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Hashing => write!(f, "hashing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Async, object-safe embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of documents. The output has one vector per input, in order.
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a single search query.
    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>>;

    /// Dimension of the vectors this provider returns.
    fn dimension(&self) -> usize;

    fn provider_type(&self) -> EmbeddingProviderType;

    fn display_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    #[test]
    fn test_provider_type_serde() {
        assert_eq!(
            serde_json::to_string(&EmbeddingProviderType::OpenAI).unwrap(),
            "\"open_ai\""
        );
        let parsed: EmbeddingProviderType = serde_json::from_str("\"hashing\"").unwrap();
        assert_eq!(parsed, EmbeddingProviderType::Hashing);
        assert_eq!(EmbeddingProviderType::default(), EmbeddingProviderType::Hashing);
    }

    #[test]
    fn test_error_display_and_conversion() {
        let err = EmbeddingError::ServerError {
            message: "boom".to_string(),
            status: Some(503),
        };
        assert_eq!(err.to_string(), "server error (HTTP 503): boom");

        let app: AppError = err.into();
        assert_eq!(app.kind(), ErrorKind::Embedding);
    }

    #[test]
    fn test_error_serializes_tagged() {
        let err = EmbeddingError::RateLimited {
            message: "slow down".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "rate_limited");
        assert_eq!(json["message"], "slow down");
    }
}
