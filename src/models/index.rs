//! Codebase Index Models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use workspace_engine_core::{Dependency, Symbol};

/// A file recorded in an index snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub path: String,
    pub language: Option<String>,
    pub size_bytes: u64,
    pub symbol_count: usize,
}

/// A dependency together with the manifest that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDependency {
    pub manifest: String,
    #[serde(flatten)]
    pub dependency: Dependency,
}

/// One index snapshot per workspace, replaced wholesale on rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseIndex {
    pub workspace_id: String,
    pub root_path: String,
    pub files: Vec<IndexedFile>,
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<IndexedDependency>,
    pub last_indexed_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIndexResult {
    pub files: usize,
    pub symbols: usize,
    pub dependencies: usize,
    pub embeddings_generated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files: usize,
    pub symbols: usize,
    pub dependencies: usize,
    pub embedding_chunks: usize,
    /// File count per detected language
    pub languages: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
}

impl IndexStatus {
    pub fn not_indexed() -> Self {
        Self {
            indexed: false,
            last_indexed_at: None,
            stats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_indexed_serializes_compactly() {
        let json = serde_json::to_value(IndexStatus::not_indexed()).unwrap();
        assert_eq!(json, serde_json::json!({ "indexed": false }));
    }
}
