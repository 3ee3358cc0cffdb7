//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//! Each service owns its queries (`TaskStore`, `IndexStore`, `EmbeddingStore`,
//! `ChangeFeed`); this module only opens the pool and creates the schema.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Row-mapping error for a stored text column holding an unknown value.
pub fn unknown_value(column: usize, kind: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown {} '{}'", kind, value).into(),
    )
}

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create an in-memory database for testing.
    ///
    /// The pool holds a single connection so every caller sees the same
    /// in-memory database. Callers must not hold a connection across a call
    /// that acquires another one.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open the default database (~/.workspace-engine/data.db)
    pub fn new() -> AppResult<Self> {
        Self::open(&database_path()?)
    }

    /// Open (or create) a database file with connection pooling
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;",
            )
        });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        // Background tasks
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                command TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                progress INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error TEXT,
                seq INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_workspace
             ON tasks(workspace_id, seq DESC)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS task_output (
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                chunk TEXT NOT NULL,
                PRIMARY KEY (task_id, seq)
            )",
            [],
        )?;

        // Codebase index snapshot
        conn.execute(
            "CREATE TABLE IF NOT EXISTS codebase_index (
                workspace_id TEXT PRIMARY KEY,
                root_path TEXT NOT NULL,
                last_indexed_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS indexed_files (
                workspace_id TEXT NOT NULL,
                path TEXT NOT NULL,
                language TEXT,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                symbol_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (workspace_id, path)
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS indexed_symbols (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                line INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_indexed_symbols_workspace
             ON indexed_symbols(workspace_id, name)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS indexed_dependencies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                manifest TEXT NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                dep_type TEXT NOT NULL
            )",
            [],
        )?;

        // Embedding chunks, grouped by generation
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embedding_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                generation TEXT NOT NULL,
                file_path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                vector BLOB NOT NULL,
                UNIQUE (workspace_id, generation, file_path, chunk_index)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_embedding_chunks_generation
             ON embedding_chunks(workspace_id, generation)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embedding_generations (
                workspace_id TEXT PRIMARY KEY,
                generation TEXT NOT NULL,
                activated_at TEXT NOT NULL
            )",
            [],
        )?;

        // File change feed
        conn.execute(
            "CREATE TABLE IF NOT EXISTS file_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                path TEXT NOT NULL,
                change_type TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_file_changes_workspace
             ON file_changes(workspace_id, timestamp_ms)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS file_snapshots (
                workspace_id TEXT NOT NULL,
                path TEXT NOT NULL,
                mtime TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (workspace_id, path)
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS watch_baselines (
                workspace_id TEXT PRIMARY KEY,
                feed_mark_ms INTEGER NOT NULL,
                polled_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(db: &Database) -> Vec<String> {
        let conn = db.get_connection().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_in_memory_schema() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.is_healthy());

        let tables = table_names(&db);
        for expected in [
            "codebase_index",
            "embedding_chunks",
            "embedding_generations",
            "file_changes",
            "file_snapshots",
            "indexed_dependencies",
            "indexed_files",
            "indexed_symbols",
            "task_output",
            "tasks",
            "watch_baselines",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_open_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("engine.db");

        let first = Database::open(&path).unwrap();
        drop(first);
        let second = Database::open(&path).unwrap();
        assert!(second.is_healthy());
        assert!(path.exists());
    }
}
