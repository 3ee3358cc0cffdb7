//! Engine State
//!
//! Owns every service and wires them together once at startup. Commands
//! receive a shared reference and never construct services themselves.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use workspace_engine_core::TokenizerRegistry;

use crate::models::settings::EngineConfig;
use crate::services::embedding::{build_provider, EmbeddingService};
use crate::services::indexer::CodebaseIndexer;
use crate::services::sandbox::{LocalSandbox, SandboxExecutor, WorkspaceDirectory};
use crate::services::tasks::{MokaTaskRegistry, TaskScheduler};
use crate::services::watcher::{ChangeFeed, FileWatcher};
use crate::storage::Database;
use crate::utils::error::{AppError, AppResult};

/// Shared engine state
pub struct EngineState {
    config: EngineConfig,
    database: Database,
    directory: Arc<WorkspaceDirectory>,
    sandbox: Arc<LocalSandbox>,
    scheduler: TaskScheduler,
    embeddings: Arc<EmbeddingService>,
    indexer: CodebaseIndexer,
    watcher: Arc<FileWatcher>,
}

impl EngineState {
    /// Open the configured database (or the default one) and start all services.
    pub fn new(config: EngineConfig) -> AppResult<Self> {
        let database = match &config.storage.database_path {
            Some(path) => Database::open(path)?,
            None => Database::new()?,
        };
        Self::with_database(config, database)
    }

    /// Same wiring over an in-memory database.
    pub fn in_memory(config: EngineConfig) -> AppResult<Self> {
        Self::with_database(config, Database::new_in_memory()?)
    }

    fn with_database(config: EngineConfig, database: Database) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;
        let pool = database.pool().clone();

        let directory = Arc::new(WorkspaceDirectory::from_entries(
            config.sandbox.workspaces_root.clone(),
            &config.workspaces,
        )?);

        let feed = Arc::new(ChangeFeed::new(pool.clone())?);
        let sandbox = Arc::new(
            LocalSandbox::new(Arc::clone(&directory), config.sandbox.clone())
                .with_change_sink(feed.clone()),
        );
        let executor: Arc<dyn SandboxExecutor> = sandbox.clone();

        let registry = Arc::new(MokaTaskRegistry::new(std::time::Duration::from_secs(
            config.tasks.registry_ttl_secs,
        )));
        let scheduler = TaskScheduler::new(
            pool.clone(),
            Arc::clone(&executor),
            registry,
            config.tasks.clone(),
        );
        scheduler.recover_interrupted()?;

        let provider = build_provider(&config.embedding);
        info!(provider = %provider.display_name(), dimension = provider.dimension(), "Embedding provider ready");
        let embeddings = Arc::new(EmbeddingService::new(
            pool.clone(),
            provider,
            config.embedding.clone(),
        ));

        let tokenizers = Arc::new(TokenizerRegistry::builtin()?);
        let indexer = CodebaseIndexer::new(
            pool.clone(),
            Arc::clone(&executor),
            Arc::clone(&embeddings),
            tokenizers,
            config.indexer.clone(),
        );

        let watcher = Arc::new(FileWatcher::new(
            pool,
            executor,
            feed,
            config.watcher.clone(),
        ));

        info!(workspaces = directory.list().len(), "Engine state initialized");
        Ok(Self {
            config,
            database,
            directory,
            sandbox,
            scheduler,
            embeddings,
            indexer,
            watcher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn directory(&self) -> &Arc<WorkspaceDirectory> {
        &self.directory
    }

    pub fn sandbox(&self) -> &Arc<LocalSandbox> {
        &self.sandbox
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub fn indexer(&self) -> &CodebaseIndexer {
        &self.indexer
    }

    pub fn watcher(&self) -> &Arc<FileWatcher> {
        &self.watcher
    }

    /// Start the background snapshot poller for every registered workspace.
    pub fn spawn_change_polling(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.watcher
            .spawn_poll_loop(Arc::clone(&self.directory), cancel)
    }
}
