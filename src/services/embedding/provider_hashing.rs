//! Hashing Embedding Provider
//!
//! Local, deterministic embeddings via signed feature hashing: every token is
//! hashed with SHA-256 into one of `dimension` buckets and the result is
//! L2-normalized. No vocabulary, no network. Similar text shares tokens and
//! therefore scores high under cosine similarity.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, EmbeddingResult};

pub const DEFAULT_HASHING_DIMENSION: usize = 256;

pub struct HashingEmbeddingProvider {
    dimension: usize,
    display_name: String,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: Option<usize>) -> Self {
        let dimension = dimension.unwrap_or(DEFAULT_HASHING_DIMENSION).max(1);
        Self {
            dimension,
            display_name: format!("Hashing ({}d)", dimension),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(documents.iter().map(|doc| self.embed(doc)).collect())
    }

    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        Ok(self.embed(query))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Hashing
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Lowercased identifier parts. `parseUserData` and `parse_user_data` both
/// yield `parse`, `user`, `data`; compound words also keep their full form.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let word = word.trim_matches('_');
        if word.chars().count() < 2 {
            continue;
        }
        let parts = split_identifier(word);
        for part in &parts {
            if part.chars().count() >= 2 {
                tokens.push(part.clone());
            }
        }
        if parts.len() > 1 {
            tokens.push(word.to_lowercase());
        }
    }

    tokens
}

fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in word.chars() {
        if ch == '_' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
