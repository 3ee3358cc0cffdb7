//! Codebase Indexer
//!
//! Per-workspace snapshots of files, symbols and dependencies.

pub mod index_store;
pub mod indexer;

pub use index_store::{IndexStore, SnapshotInfo};
pub use indexer::{CodebaseIndexer, SKIP_DIRS};
