//! Embedding Chunk Storage
//!
//! Chunks are written under a generation id. A generation becomes visible to
//! search only when `activate_generation` swaps it in, which also drops every
//! other generation for the workspace in the same transaction.

use rusqlite::params;

use crate::models::search::EmbeddingChunk;
use crate::storage::database::{DbConnection, DbPool};
use crate::utils::error::{AppError, AppResult};

/// A stored chunk of the active generation.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    pool: DbPool,
}

impl EmbeddingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Write chunks under `generation`. They stay invisible until activated.
    pub fn insert_chunks(&self, generation: &str, chunks: &[EmbeddingChunk]) -> AppResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO embedding_chunks
                     (workspace_id, generation, file_path, chunk_index, content, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.workspace_id,
                    generation,
                    chunk.file_path,
                    chunk.chunk_index as i64,
                    chunk.content,
                    embedding_to_bytes(&chunk.vector),
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Make `generation` the active one and delete all others for the workspace.
    pub fn activate_generation(&self, workspace_id: &str, generation: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM embedding_chunks WHERE workspace_id = ?1 AND generation != ?2",
            params![workspace_id, generation],
        )?;
        tx.execute(
            "INSERT INTO embedding_generations (workspace_id, generation, activated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(workspace_id) DO UPDATE SET
                 generation = excluded.generation,
                 activated_at = excluded.activated_at",
            params![workspace_id, generation, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop the chunks of a generation that will never be activated.
    pub fn discard_generation(&self, workspace_id: &str, generation: &str) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let deleted = conn.execute(
            "DELETE FROM embedding_chunks WHERE workspace_id = ?1 AND generation = ?2",
            params![workspace_id, generation],
        )?;
        Ok(deleted)
    }

    /// All chunks of the workspace's active generation.
    pub fn active_chunks(&self, workspace_id: &str) -> AppResult<Vec<StoredChunk>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT c.file_path, c.chunk_index, c.content, c.vector
             FROM embedding_chunks c
             JOIN embedding_generations g
               ON g.workspace_id = c.workspace_id AND g.generation = c.generation
             WHERE c.workspace_id = ?1
             ORDER BY c.file_path, c.chunk_index",
        )?;
        let rows = stmt
            .query_map(params![workspace_id], |row| {
                let bytes: Vec<u8> = row.get(3)?;
                Ok(StoredChunk {
                    file_path: row.get(0)?,
                    chunk_index: row.get::<_, i64>(1)? as usize,
                    content: row.get(2)?,
                    vector: bytes_to_embedding(&bytes),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_active(&self, workspace_id: &str) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM embedding_chunks c
             JOIN embedding_generations g
               ON g.workspace_id = c.workspace_id AND g.generation = c.generation
             WHERE c.workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Serialize an f32 vector as little-endian bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Deserialize little-endian bytes back to an f32 vector.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
