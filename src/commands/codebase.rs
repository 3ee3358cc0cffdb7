//! Codebase Commands
//!
//! Index builds, index status, symbol lookup and semantic search.

use workspace_engine_core::Symbol;

use crate::models::index::{BuildIndexResult, IndexStatus};
use crate::models::response::CommandResponse;
use crate::models::search::SearchResult;
use crate::state::EngineState;

pub const DEFAULT_SYMBOL_LIMIT: usize = 50;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Rebuild the workspace index from `path` (relative to the workspace root).
pub async fn build_index(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    path: &str,
    include_embeddings: bool,
) -> CommandResponse<BuildIndexResult> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state
            .indexer()
            .build_index(workspace_id, path, include_embeddings)
            .await
    }
    .await;
    result.into()
}

/// Get index status; a workspace that was never indexed reports `indexed: false`.
pub fn index_status(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
) -> CommandResponse<IndexStatus> {
    let result = state
        .directory()
        .authorize(workspace_id, owner)
        .and_then(|_| state.indexer().get_index_status(workspace_id));
    result.into()
}

pub fn query_symbols(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    pattern: &str,
    limit: Option<usize>,
) -> CommandResponse<Vec<Symbol>> {
    let result = state.directory().authorize(workspace_id, owner).and_then(|_| {
        state.indexer().query_symbols(
            workspace_id,
            pattern,
            limit.unwrap_or(DEFAULT_SYMBOL_LIMIT),
        )
    });
    result.into()
}

/// Rank the workspace's embedded chunks against `query`.
pub async fn semantic_search(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    query: &str,
    limit: Option<usize>,
) -> CommandResponse<Vec<SearchResult>> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state
            .embeddings()
            .search(workspace_id, query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .await
    }
    .await;
    result.into()
}
