//! Codebase Indexer
//!
//! Builds a workspace snapshot entirely through the sandbox executor: files
//! are listed with `find`, read with `read_file`, tokenized per language and
//! stored together with the dependencies declared in root manifests.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::index_store::IndexStore;
use crate::models::index::{
    BuildIndexResult, CodebaseIndex, IndexStatus, IndexedDependency, IndexedFile,
};
use crate::models::search::SourceFile;
use crate::models::settings::IndexerSettings;
use crate::services::embedding::EmbeddingService;
use crate::services::sandbox::{shell_quote, ExecOptions, SandboxExecutor};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::relative_to_root;
use workspace_engine_core::{
    detect_language, parse_manifest, Symbol, TokenizerRegistry, MANIFEST_FILES,
};

/// Directories never descended into.
pub const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", "vendor"];

const MAX_SYMBOL_QUERY_LIMIT: usize = 500;

/// Files read during a build, ready for tokenizing and embedding.
struct ReadPhase {
    files: Vec<SourceFile>,
    dependencies: Vec<IndexedDependency>,
}

pub struct CodebaseIndexer {
    executor: Arc<dyn SandboxExecutor>,
    store: IndexStore,
    embeddings: Arc<EmbeddingService>,
    tokenizers: Arc<TokenizerRegistry>,
    settings: IndexerSettings,
    /// Serializes rebuilds per workspace
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CodebaseIndexer {
    pub fn new(
        pool: DbPool,
        executor: Arc<dyn SandboxExecutor>,
        embeddings: Arc<EmbeddingService>,
        tokenizers: Arc<TokenizerRegistry>,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            executor,
            store: IndexStore::new(pool),
            embeddings,
            tokenizers,
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

    /// Rebuild the workspace snapshot from the files under `root_path`.
    pub async fn build_index(
        &self,
        workspace_id: &str,
        root_path: &str,
        include_embeddings: bool,
    ) -> AppResult<BuildIndexResult> {
        let lock = self.lock_for(workspace_id);
        let _guard = lock.lock().await;

        let root = self.normalize_root(workspace_id, root_path)?;
        info!(workspace_id = %workspace_id, root = %root, include_embeddings, "Building codebase index");

        let timeout = self.settings.timeout();
        let read = tokio::time::timeout(timeout, self.read_phase(workspace_id, &root))
            .await
            .map_err(|_| AppError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
                partial: Box::default(),
            })??;

        let mut indexed_files = Vec::with_capacity(read.files.len());
        let mut symbols: Vec<Symbol> = Vec::new();
        for file in &read.files {
            let found = self.tokenizers.extract(&file.path, &file.content);
            indexed_files.push(IndexedFile {
                path: file.path.clone(),
                language: detect_language(&file.path).map(str::to_string),
                size_bytes: file.content.len() as u64,
                symbol_count: found.len(),
            });
            symbols.extend(found);
        }

        let snapshot = CodebaseIndex {
            workspace_id: workspace_id.to_string(),
            root_path: root.clone(),
            files: indexed_files,
            symbols,
            dependencies: read.dependencies,
            last_indexed_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.replace_snapshot(&snapshot)?;

        let embeddings_generated = if include_embeddings {
            match self
                .embeddings
                .generate_embeddings(workspace_id, &read.files)
                .await
            {
                Ok(count) => count,
                Err(e) => {
                    warn!(workspace_id = %workspace_id, error = %e, "Embedding generation failed, index kept without embeddings");
                    0
                }
            }
        } else {
            0
        };

        let result = BuildIndexResult {
            files: snapshot.files.len(),
            symbols: snapshot.symbols.len(),
            dependencies: snapshot.dependencies.len(),
            embeddings_generated,
        };
        info!(
            workspace_id = %workspace_id,
            files = result.files,
            symbols = result.symbols,
            dependencies = result.dependencies,
            embeddings = result.embeddings_generated,
            "Codebase index built"
        );
        Ok(result)
    }

    pub fn get_index_status(&self, workspace_id: &str) -> AppResult<IndexStatus> {
        let Some((info, mut stats)) = self.store.snapshot_stats(workspace_id)? else {
            return Ok(IndexStatus::not_indexed());
        };
        stats.embedding_chunks = self.embeddings.chunk_count(workspace_id)?;

        Ok(IndexStatus {
            indexed: true,
            last_indexed_at: Some(info.last_indexed_at),
            stats: Some(stats),
        })
    }

    /// Symbols of the stored snapshot whose name contains `pattern`.
    pub fn query_symbols(
        &self,
        workspace_id: &str,
        pattern: &str,
        limit: usize,
    ) -> AppResult<Vec<Symbol>> {
        if pattern.trim().is_empty() {
            return Err(AppError::validation("pattern must not be empty"));
        }
        self.store
            .query_symbols(workspace_id, pattern.trim(), limit.clamp(1, MAX_SYMBOL_QUERY_LIMIT))
    }

    /// Resolve `root_path` inside the workspace and return it relative to the
    /// workspace root ("." for the root itself).
    fn normalize_root(&self, workspace_id: &str, root_path: &str) -> AppResult<String> {
        let requested = if root_path.trim().is_empty() { "." } else { root_path };
        let workspace_root = self.executor.resolve_path(workspace_id, ".")?;
        let resolved = self.executor.resolve_path(workspace_id, requested)?;
        if !resolved.is_dir() {
            return Err(AppError::not_found(format!("directory {}", root_path)));
        }
        let relative = relative_to_root(&workspace_root, &resolved)
            .ok_or_else(|| AppError::path_violation(root_path.to_string()))?;
        Ok(if relative.is_empty() {
            ".".to_string()
        } else {
            relative
        })
    }

    async fn read_phase(&self, workspace_id: &str, root: &str) -> AppResult<ReadPhase> {
        let paths = self.enumerate_files(workspace_id, root).await?;
        debug!(workspace_id = %workspace_id, count = paths.len(), "Enumerated source files");

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match self.executor.read_file(workspace_id, &path).await {
                Ok(content) if content.len() as u64 > self.settings.max_file_size_bytes => {
                    debug!(path = %path, "Skipping oversized file");
                }
                Ok(content) => files.push(SourceFile::new(path, content)),
                Err(e) => warn!(path = %path, error = %e, "Skipping unreadable file"),
            }
        }

        let mut dependencies = Vec::new();
        for manifest in MANIFEST_FILES {
            let path = join_relative(root, manifest);
            let content = match self.executor.read_file(workspace_id, &path).await {
                Ok(content) => content,
                Err(AppError::NotFound(_)) => continue,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable manifest");
                    continue;
                }
            };
            match parse_manifest(manifest, &content) {
                Ok(Some(deps)) => dependencies.extend(deps.into_iter().map(|dependency| {
                    IndexedDependency {
                        manifest: path.clone(),
                        dependency,
                    }
                })),
                Ok(None) => {}
                Err(e) => warn!(path = %path, error = %e, "Failed to parse manifest"),
            }
        }

        Ok(ReadPhase {
            files,
            dependencies,
        })
    }

    /// One capped `find` per extension; results are workspace-relative and sorted.
    async fn enumerate_files(&self, workspace_id: &str, root: &str) -> AppResult<Vec<String>> {
        let mut paths = BTreeSet::new();
        for ext in &self.settings.extensions {
            let command = find_command(
                root,
                ext,
                self.settings.max_file_size_bytes,
                self.settings.max_files_per_pattern,
            );
            let options = ExecOptions::new().with_timeout(self.settings.timeout());
            let result = self
                .executor
                .execute_command(workspace_id, &command, options)
                .await?;
            if !result.succeeded() {
                warn!(ext = %ext, exit_code = result.exit_code, stderr = %result.stderr.trim(), "find reported errors");
            }
            paths.extend(
                result
                    .stdout
                    .lines()
                    .map(|line| line.trim_start_matches("./").to_string())
                    .filter(|line| !line.is_empty()),
            );
        }
        Ok(paths.into_iter().collect())
    }
}

fn find_command(root: &str, ext: &str, max_size: u64, limit: usize) -> String {
    let mut command = format!(
        "find {} -type f -name {}",
        shell_quote(root),
        shell_quote(&format!("*.{}", ext))
    );
    for dir in SKIP_DIRS {
        command.push_str(&format!(" -not -path {}", shell_quote(&format!("*/{}/*", dir))));
    }
    command.push_str(&format!(" -size -{}c 2>/dev/null | head -n {}", max_size + 1, limit));
    command
}

fn join_relative(root: &str, name: &str) -> String {
    if root == "." || root.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{EmbeddingSettings, SandboxSettings};
    use crate::services::embedding::{
        EmbeddingError, EmbeddingProvider, EmbeddingProviderType, EmbeddingResult,
        HashingEmbeddingProvider,
    };
    use crate::services::sandbox::{LocalSandbox, WorkspaceDirectory};
    use crate::storage::database::Database;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    /// Provider that is never reachable.
    struct UnreachableProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for UnreachableProvider {
        async fn embed_documents(&self, _documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Err(EmbeddingError::ProviderUnavailable {
                message: "connection refused".to_string(),
            })
        }

        async fn embed_query(&self, _query: &str) -> EmbeddingResult<Vec<f32>> {
            Err(EmbeddingError::ProviderUnavailable {
                message: "connection refused".to_string(),
            })
        }

        fn dimension(&self) -> usize {
            8
        }

        fn provider_type(&self) -> EmbeddingProviderType {
            EmbeddingProviderType::OpenAI
        }

        fn display_name(&self) -> &str {
            "unreachable"
        }
    }

    fn indexer(dir: &TempDir) -> CodebaseIndexer {
        let db = Database::new_in_memory().unwrap();
        indexer_with(dir, &db, Arc::new(HashingEmbeddingProvider::new(None)))
    }

    fn indexer_with(
        dir: &TempDir,
        db: &Database,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> CodebaseIndexer {
        let directory = Arc::new(WorkspaceDirectory::new(None));
        directory.register("ws1", "alice", dir.path()).unwrap();
        let sandbox = Arc::new(LocalSandbox::new(directory, SandboxSettings::default()));
        let embeddings = Arc::new(EmbeddingService::new(
            db.pool().clone(),
            provider,
            EmbeddingSettings::default(),
        ));
        CodebaseIndexer::new(
            db.pool().clone(),
            sandbox,
            embeddings,
            Arc::new(TokenizerRegistry::builtin().unwrap()),
            IndexerSettings::default(),
        )
    }

    fn sample_project(dir: &TempDir) {
        write(dir, "src/app.ts", "export class App {}\nexport function start() {}\n");
        write(dir, "src/util.py", "def helper():\n    pass\n");
        write(dir, "node_modules/lib/index.js", "function hidden() {}\n");
        write(dir, "dist/bundle.js", "function bundled() {}\n");
        write(dir, "README.md", "# readme\n");
        write(
            dir,
            "package.json",
            r#"{"dependencies":{"express":"^4.18.0"},"devDependencies":{"jest":"^29.0.0"}}"#,
        );
    }

    #[test]
    fn test_find_command_shape() {
        let cmd = find_command(".", "ts", 100, 200);
        assert!(cmd.starts_with("find '.' -type f -name '*.ts'"));
        assert!(cmd.contains("-not -path '*/node_modules/*'"));
        assert!(cmd.contains("-size -101c"));
        assert!(cmd.ends_with("| head -n 200"));
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative(".", "package.json"), "package.json");
        assert_eq!(join_relative("web/", "package.json"), "web/package.json");
    }

    #[tokio::test]
    async fn test_build_index_skips_vendor_dirs() {
        let dir = TempDir::new().unwrap();
        sample_project(&dir);
        let indexer = indexer(&dir);

        let result = indexer.build_index("ws1", ".", false).await.unwrap();
        assert_eq!(result.files, 2);
        assert_eq!(result.symbols, 3);
        assert_eq!(result.dependencies, 2);
        assert_eq!(result.embeddings_generated, 0);

        let status = indexer.get_index_status("ws1").unwrap();
        assert!(status.indexed);
        let stats = status.stats.unwrap();
        assert_eq!(stats.languages.get("typescript"), Some(&1));
        assert_eq!(stats.languages.get("python"), Some(&1));
        assert_eq!(stats.embedding_chunks, 0);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let dir = TempDir::new().unwrap();
        sample_project(&dir);
        let indexer = indexer(&dir);

        let first = indexer.build_index("ws1", ".", true).await.unwrap();
        let second = indexer.build_index("ws1", ".", true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.embeddings_generated, 2);
    }

    #[tokio::test]
    async fn test_failing_provider_keeps_index_and_previous_embeddings() {
        let dir = TempDir::new().unwrap();
        sample_project(&dir);
        let db = Database::new_in_memory().unwrap();

        let healthy = indexer_with(&dir, &db, Arc::new(HashingEmbeddingProvider::new(None)));
        assert_eq!(healthy.build_index("ws1", ".", true).await.unwrap().embeddings_generated, 2);

        write(&dir, "src/extra.ts", "export function extra() {}\n");
        let failing = indexer_with(&dir, &db, Arc::new(UnreachableProvider));
        let result = failing.build_index("ws1", ".", true).await.unwrap();
        assert_eq!(result.files, 3);
        assert_eq!(result.symbols, 4);
        assert_eq!(result.embeddings_generated, 0);

        let status = failing.get_index_status("ws1").unwrap();
        assert!(status.indexed);
        let stats = status.stats.unwrap();
        assert_eq!(stats.files, 3);
        // The failed run's generation was discarded; the earlier one stays active
        assert_eq!(stats.embedding_chunks, 2);
    }

    #[tokio::test]
    async fn test_status_before_indexing() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(&dir);
        let status = indexer.get_index_status("ws1").unwrap();
        assert!(!status.indexed);
        assert!(status.stats.is_none());
    }

    #[tokio::test]
    async fn test_query_symbols_after_build() {
        let dir = TempDir::new().unwrap();
        sample_project(&dir);
        let indexer = indexer(&dir);
        indexer.build_index("ws1", ".", false).await.unwrap();

        let found = indexer.query_symbols("ws1", "start", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "src/app.ts");
        assert_eq!(found[0].line, 2);

        assert!(matches!(
            indexer.query_symbols("ws1", " ", 10).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_subdirectory_root_and_manifest() {
        let dir = TempDir::new().unwrap();
        write(&dir, "svc/main.go", "package main\n\nfunc main() {}\n");
        write(
            &dir,
            "svc/go.mod",
            "module example.com/svc\n\ngo 1.22\n\nrequire github.com/google/uuid v1.6.0\n",
        );
        write(&dir, "other/skip.go", "func skipped() {}\n");
        let indexer = indexer(&dir);

        let result = indexer.build_index("ws1", "svc", false).await.unwrap();
        assert_eq!(result.files, 1);
        assert_eq!(result.dependencies, 1);

        let symbols = indexer.query_symbols("ws1", "main", 10).unwrap();
        assert_eq!(symbols[0].file, "svc/main.go");
    }

    #[tokio::test]
    async fn test_root_outside_workspace_rejected() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(&dir);
        let err = indexer.build_index("ws1", "../..", false).await.unwrap_err();
        assert!(matches!(err, AppError::PathViolation(_)));
    }
}
