//! Embedding Service
//!
//! Chunks source files on line boundaries, embeds each chunk through the
//! configured provider and serves cosine-similarity search over the active
//! generation of a workspace.

use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::provider::EmbeddingProvider;
use super::store::EmbeddingStore;
use crate::models::search::{EmbeddingChunk, SearchResult, SourceFile};
use crate::models::settings::EmbeddingSettings;
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use workspace_engine_core::chunk_by_lines;

const MAX_SEARCH_LIMIT: usize = 100;

/// Cosine similarity of two vectors; 0.0 on length mismatch or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Provider input for a chunk.
fn embedding_input(path: &str, content: &str) -> String {
    format!("File: {}\n\n{}", path, content)
}

pub struct EmbeddingService {
    store: EmbeddingStore,
    provider: Arc<dyn EmbeddingProvider>,
    settings: EmbeddingSettings,
    /// Serializes generation runs per workspace
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EmbeddingService {
    pub fn new(pool: DbPool, provider: Arc<dyn EmbeddingProvider>, settings: EmbeddingSettings) -> Self {
        Self {
            store: EmbeddingStore::new(pool),
            provider,
            settings,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, workspace_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Replace the workspace's embeddings with chunks of `files`.
    ///
    /// Returns the number of chunks stored. Chunks the provider fails on are
    /// skipped; if every chunk fails the previous generation stays active and
    /// an `Embedding` error is returned.
    pub async fn generate_embeddings(
        &self,
        workspace_id: &str,
        files: &[SourceFile],
    ) -> AppResult<usize> {
        let lock = self.lock_for(workspace_id);
        let _guard = lock.lock().await;

        let generation = uuid::Uuid::new_v4().to_string();
        let mut attempted = 0usize;
        let mut stored = 0usize;

        debug!(
            workspace_id = %workspace_id,
            generation = %generation,
            files = files.len(),
            provider = %self.provider.display_name(),
            "Generating embeddings"
        );

        for batch in files.chunks(self.settings.batch_size.max(1)) {
            let jobs: Vec<(String, usize, String)> = batch
                .iter()
                .flat_map(|file| {
                    chunk_by_lines(&file.content, self.settings.chunk_size)
                        .into_iter()
                        .map(move |chunk| (file.path.clone(), chunk.index, chunk.content))
                })
                .collect();
            attempted += jobs.len();

            let chunks: Vec<EmbeddingChunk> = stream::iter(jobs)
                .map(|(path, chunk_index, content)| {
                    let provider = Arc::clone(&self.provider);
                    let workspace_id = workspace_id.to_string();
                    async move {
                        let input = embedding_input(&path, &content);
                        match provider.embed_documents(&[input.as_str()]).await {
                            Ok(mut vectors) if !vectors.is_empty() => Some(EmbeddingChunk {
                                workspace_id,
                                file_path: path,
                                chunk_index,
                                content,
                                vector: vectors.swap_remove(0),
                            }),
                            Ok(_) => {
                                warn!(path = %path, chunk_index, "Provider returned no vector, skipping chunk");
                                None
                            }
                            Err(e) => {
                                warn!(path = %path, chunk_index, error = %e, "Failed to embed chunk, skipping");
                                None
                            }
                        }
                    }
                })
                .buffer_unordered(self.settings.max_concurrent_requests.max(1))
                .filter_map(|chunk| async move { chunk })
                .collect()
                .await;

            match self.store.insert_chunks(&generation, &chunks) {
                Ok(n) => stored += n,
                Err(e) => {
                    self.discard(workspace_id, &generation);
                    return Err(e);
                }
            }
        }

        if attempted > 0 && stored == 0 {
            self.discard(workspace_id, &generation);
            return Err(AppError::embedding(format!(
                "all {} chunks failed to embed",
                attempted
            )));
        }

        if let Err(e) = self.store.activate_generation(workspace_id, &generation) {
            self.discard(workspace_id, &generation);
            return Err(e);
        }

        info!(
            workspace_id = %workspace_id,
            chunks = stored,
            skipped = attempted - stored,
            "Embeddings generated"
        );
        Ok(stored)
    }

    fn discard(&self, workspace_id: &str, generation: &str) {
        if let Err(e) = self.store.discard_generation(workspace_id, generation) {
            warn!(workspace_id = %workspace_id, generation = %generation, error = %e, "Failed to discard generation");
        }
    }

    /// Top `limit` chunks of the workspace by cosine similarity to `query`.
    pub async fn search(
        &self,
        workspace_id: &str,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::validation("query must not be empty"));
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

        let query_vector = self.provider.embed_query(query).await?;
        let chunks = self.store.active_chunks(workspace_id)?;

        let mut results: Vec<SearchResult> = chunks
            .into_iter()
            .map(|chunk| SearchResult {
                similarity: cosine_similarity(&query_vector, &chunk.vector),
                path: chunk.file_path,
                content: chunk.content,
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    /// Chunks in the workspace's active generation.
    pub fn chunk_count(&self, workspace_id: &str) -> AppResult<usize> {
        self.store.count_active(workspace_id)
    }
}
