//! Semantic Search / Embedding Store
//!
//! Pluggable embedding providers, generation-based chunk storage and
//! cosine-similarity search scoped to one workspace.

pub mod provider;
pub mod provider_hashing;
pub mod provider_openai;
pub mod service;
pub mod store;

use std::sync::Arc;
use tracing::warn;

use crate::models::settings::EmbeddingSettings;

pub use provider::{EmbeddingError, EmbeddingProvider, EmbeddingProviderType, EmbeddingResult};
pub use provider_hashing::HashingEmbeddingProvider;
pub use provider_openai::OpenAIEmbeddingProvider;
pub use service::{cosine_similarity, EmbeddingService};
pub use store::{bytes_to_embedding, embedding_to_bytes, EmbeddingStore};

/// Construct the provider selected in settings.
///
/// The OpenAI key is read from the environment variable named by
/// `api_key_env`; a missing key surfaces as an authentication error on the
/// first request rather than at startup.
pub fn build_provider(settings: &EmbeddingSettings) -> Arc<dyn EmbeddingProvider> {
    match settings.provider {
        EmbeddingProviderType::OpenAI => {
            let api_key = std::env::var(&settings.api_key_env).ok();
            if api_key.is_none() {
                warn!(env = %settings.api_key_env, "Embedding API key is not set");
            }
            Arc::new(OpenAIEmbeddingProvider::new(settings, api_key))
        }
        EmbeddingProviderType::Hashing => Arc::new(HashingEmbeddingProvider::new(settings.dimension)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_selects_backend() {
        let hashing = build_provider(&EmbeddingSettings::default());
        assert_eq!(hashing.provider_type(), EmbeddingProviderType::Hashing);

        let settings = EmbeddingSettings {
            provider: EmbeddingProviderType::OpenAI,
            api_key_env: "WORKSPACE_ENGINE_TEST_UNSET_KEY".to_string(),
            dimension: Some(512),
            ..EmbeddingSettings::default()
        };
        let openai = build_provider(&settings);
        assert_eq!(openai.provider_type(), EmbeddingProviderType::OpenAI);
        assert_eq!(openai.dimension(), 512);
    }
}
