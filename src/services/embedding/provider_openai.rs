//! OpenAI Embedding Provider
//!
//! Implements `EmbeddingProvider` over the OpenAI embeddings API using
//! reqwest. A custom `base_url` points it at any OpenAI-compatible server
//! (Azure OpenAI, vLLM, LiteLLM).
//!
//! - Endpoint: `POST https://api.openai.com/v1/embeddings`
//! - Auth: `Authorization: Bearer {api_key}`
//! - Body: `{ model, input: ["text1", ...], dimensions? }`
//! - Response: `{ data: [{ embedding, index }], model, usage }`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::provider::{EmbeddingError, EmbeddingProvider, EmbeddingProviderType, EmbeddingResult};
use crate::models::settings::EmbeddingSettings;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const OPENAI_EMBEDDING_API_URL: &str = "https://api.openai.com/v1/embeddings";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Native dimension of text-embedding-3-small.
const DEFAULT_DIMENSION: usize = 1536;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    display_name: String,
}

impl OpenAIEmbeddingProvider {
    /// Build from embedding settings. The key is passed in separately so it
    /// never has to live in the config file.
    pub fn new(settings: &EmbeddingSettings, api_key: Option<String>) -> Self {
        let model = if settings.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            settings.model.clone()
        };

        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_EMBEDDING_API_URL)
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.unwrap_or_default(),
            display_name: format!("OpenAI ({})", model),
            dimension: settings.dimension.unwrap_or(DEFAULT_DIMENSION),
            model,
            base_url,
        }
    }

    fn build_request_body(&self, input: serde_json::Value) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        // Only text-embedding-3-* accepts a reduced dimension
        if self.dimension != DEFAULT_DIMENSION || self.model.contains("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dimension);
        }

        body
    }

    async fn post_embeddings(
        &self,
        body: &serde_json::Value,
    ) -> EmbeddingResult<OpenAIEmbeddingResponse> {
        if self.api_key.is_empty() {
            return Err(EmbeddingError::AuthenticationFailed {
                message: "OpenAI API key is not configured".to_string(),
            });
        }

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status().as_u16();

        if status == 200 {
            let resp_text = response
                .text()
                .await
                .map_err(|e| EmbeddingError::NetworkError {
                    message: format!("failed to read response body: {}", e),
                })?;

            serde_json::from_str::<OpenAIEmbeddingResponse>(&resp_text).map_err(|e| {
                EmbeddingError::ParseError {
                    message: format!("failed to parse embedding response: {}", e),
                }
            })
        } else {
            let body_text = response.text().await.unwrap_or_default();
            Err(self.map_http_error(status, &body_text))
        }
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_connect() {
            EmbeddingError::ProviderUnavailable {
                message: format!("cannot connect to {}", self.base_url),
            }
        } else if err.is_timeout() {
            EmbeddingError::NetworkError {
                message: format!("request to {} timed out", self.base_url),
            }
        } else {
            EmbeddingError::NetworkError {
                message: err.to_string(),
            }
        }
    }

    fn map_http_error(&self, status: u16, body_text: &str) -> EmbeddingError {
        let error_detail = serde_json::from_str::<OpenAIErrorResponse>(body_text)
            .ok()
            .and_then(|r| r.error);

        let error_message = error_detail
            .as_ref()
            .and_then(|d| d.message.as_deref())
            .unwrap_or(body_text);

        match status {
            401 => EmbeddingError::AuthenticationFailed {
                message: error_message.to_string(),
            },
            429 => EmbeddingError::RateLimited {
                message: error_message.to_string(),
            },
            400 => {
                if error_message.contains("token") || error_message.contains("length") {
                    EmbeddingError::InputTooLong {
                        message: error_message.to_string(),
                    }
                } else {
                    EmbeddingError::InvalidConfig {
                        message: format!("bad request: {}", error_message),
                    }
                }
            }
            404 => EmbeddingError::ModelNotFound {
                model: format!("'{}' not found at {}", self.model, self.base_url),
            },
            _ => EmbeddingError::ServerError {
                message: error_message.to_string(),
                status: Some(status),
            },
        }
    }

    fn extract_embeddings(
        mut response: OpenAIEmbeddingResponse,
        expected_count: usize,
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        if response.data.len() != expected_count {
            return Err(EmbeddingError::ParseError {
                message: format!(
                    "expected {} embeddings but got {}",
                    expected_count,
                    response.data.len()
                ),
            });
        }

        // Restore input order
        response.data.sort_by_key(|d| d.index);

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.build_request_body(serde_json::json!(documents));
        let response = self.post_embeddings(&body).await?;

        Self::extract_embeddings(response, documents.len())
    }

    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        let body = self.build_request_body(serde_json::json!(query));
        let response = self.post_embeddings(&body).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::ParseError {
                message: "empty embeddings for query".to_string(),
            })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::OpenAI
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}
