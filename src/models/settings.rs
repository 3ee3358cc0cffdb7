//! Settings Models
//!
//! Engine configuration data structures stored in config.json.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::services::embedding::provider::EmbeddingProviderType;

/// Engine configuration stored in config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageSettings,
    pub sandbox: SandboxSettings,
    pub tasks: TaskSettings,
    pub indexer: IndexerSettings,
    pub embedding: EmbeddingSettings,
    pub watcher: WatcherSettings,
    /// Statically registered workspaces
    pub workspaces: Vec<WorkspaceEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Overrides ~/.workspace-engine/data.db
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Directory holding one subdirectory per workspace id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspaces_root: Option<PathBuf>,
    pub default_timeout_secs: u64,
    /// Cap on captured stdout/stderr per stream
    pub max_output_bytes: usize,
    pub shell: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            workspaces_root: None,
            default_timeout_secs: 120,
            max_output_bytes: 1024 * 1024,
            shell: "sh".to_string(),
        }
    }
}

impl SandboxSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Output chunks buffered before a database flush
    pub flush_every: usize,
    pub max_concurrent_per_workspace: usize,
    /// How long in-flight handles stay in the registry
    pub registry_ttl_secs: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            flush_every: 10,
            max_concurrent_per_workspace: 1,
            registry_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerSettings {
    /// File extensions (without dot) that are indexed
    pub extensions: Vec<String>,
    pub max_files_per_pattern: usize,
    pub max_file_size_bytes: u64,
    pub timeout_secs: u64,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            extensions: ["ts", "tsx", "js", "jsx", "py", "go", "rs", "java"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_files_per_pattern: 200,
            max_file_size_bytes: 1024 * 1024,
            timeout_secs: 120,
        }
    }
}

impl IndexerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderType,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Files processed per batch
    pub batch_size: usize,
    /// Outbound embedding requests in flight within a batch
    pub max_concurrent_requests: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            model: String::new(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: None,
            chunk_size: 1000,
            batch_size: 20,
            max_concurrent_requests: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    pub poll_interval_secs: u64,
    pub retention_secs: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            retention_secs: 3600,
        }
    }
}

impl WatcherSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub id: String,
    pub owner: String,
    pub root: PathBuf,
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sandbox.default_timeout_secs == 0 {
            return Err("sandbox.default_timeout_secs must be at least 1".to_string());
        }
        if self.sandbox.max_output_bytes == 0 {
            return Err("sandbox.max_output_bytes must be positive".to_string());
        }
        if self.sandbox.shell.trim().is_empty() {
            return Err("sandbox.shell must not be empty".to_string());
        }

        if self.tasks.flush_every == 0 {
            return Err("tasks.flush_every must be at least 1".to_string());
        }
        if self.tasks.max_concurrent_per_workspace == 0 {
            return Err("tasks.max_concurrent_per_workspace must be at least 1".to_string());
        }

        if self.indexer.extensions.is_empty() {
            return Err("indexer.extensions must not be empty".to_string());
        }
        if let Some(bad) = self
            .indexer
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(format!("invalid indexer extension: {:?}", bad));
        }
        if self.indexer.max_files_per_pattern == 0 {
            return Err("indexer.max_files_per_pattern must be at least 1".to_string());
        }

        if self.embedding.chunk_size == 0 {
            return Err("embedding.chunk_size must be at least 1".to_string());
        }
        if self.embedding.batch_size == 0 {
            return Err("embedding.batch_size must be at least 1".to_string());
        }
        if self.embedding.max_concurrent_requests == 0 {
            return Err("embedding.max_concurrent_requests must be at least 1".to_string());
        }
        if self.embedding.dimension == Some(0) {
            return Err("embedding.dimension must be at least 1".to_string());
        }

        if self.watcher.poll_interval_secs == 0 {
            return Err("watcher.poll_interval_secs must be at least 1".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for ws in &self.workspaces {
            if ws.owner.trim().is_empty() {
                return Err(format!("workspace {} has no owner", ws.id));
            }
            if !seen.insert(ws.id.as_str()) {
                return Err(format!("duplicate workspace id: {}", ws.id));
            }
        }

        Ok(())
    }
}
