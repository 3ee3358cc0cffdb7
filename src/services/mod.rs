//! Services
//!
//! Business logic services for the engine.
//! Services handle the core functionality and are called by commands.

pub mod embedding;
pub mod indexer;
pub mod sandbox;
pub mod tasks;
pub mod watcher;

pub use embedding::{build_provider, EmbeddingProvider, EmbeddingService};
pub use indexer::CodebaseIndexer;
pub use sandbox::{LocalSandbox, SandboxExecutor, WorkspaceDirectory};
pub use tasks::{MokaTaskRegistry, TaskRegistry, TaskScheduler};
pub use watcher::{ChangeFeed, FileWatcher};
