//! SQLite Index Snapshot Storage
//!
//! One snapshot per workspace: file list, symbols and dependencies. A rebuild
//! replaces the snapshot wholesale inside one transaction, so readers see
//! either the previous snapshot or the new one.

use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

use crate::models::index::{CodebaseIndex, IndexStats};
use crate::storage::database::{unknown_value, DbConnection, DbPool};
use crate::utils::error::{AppError, AppResult};
use workspace_engine_core::{Symbol, SymbolKind};

/// Header row of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub root_path: String,
    pub last_indexed_at: String,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: DbPool,
}

impl IndexStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Replace the workspace's snapshot with `index`.
    pub fn replace_snapshot(&self, index: &CodebaseIndex) -> AppResult<()> {
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        let ws = index.workspace_id.as_str();

        tx.execute("DELETE FROM indexed_files WHERE workspace_id = ?1", params![ws])?;
        tx.execute("DELETE FROM indexed_symbols WHERE workspace_id = ?1", params![ws])?;
        tx.execute("DELETE FROM indexed_dependencies WHERE workspace_id = ?1", params![ws])?;

        tx.execute(
            "INSERT INTO codebase_index (workspace_id, root_path, last_indexed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(workspace_id) DO UPDATE SET
                 root_path = excluded.root_path,
                 last_indexed_at = excluded.last_indexed_at",
            params![ws, index.root_path, index.last_indexed_at],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO indexed_files (workspace_id, path, language, size_bytes, symbol_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for file in &index.files {
                stmt.execute(params![
                    ws,
                    file.path,
                    file.language,
                    file.size_bytes as i64,
                    file.symbol_count as i64,
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO indexed_symbols (workspace_id, file_path, name, kind, line)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for symbol in &index.symbols {
                stmt.execute(params![
                    ws,
                    symbol.file,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.line as i64,
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO indexed_dependencies (workspace_id, manifest, name, version, dep_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for dep in &index.dependencies {
                stmt.execute(params![
                    ws,
                    dep.manifest,
                    dep.dependency.name,
                    dep.dependency.version,
                    dep.dependency.dep_type.as_str(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Header and counts of the stored snapshot, read in one transaction so
    /// a concurrent rebuild is seen entirely or not at all.
    /// `embedding_chunks` is left at zero.
    pub fn snapshot_stats(&self, workspace_id: &str) -> AppResult<Option<(SnapshotInfo, IndexStats)>> {
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;

        let info = tx
            .query_row(
                "SELECT root_path, last_indexed_at FROM codebase_index WHERE workspace_id = ?1",
                params![workspace_id],
                |row| {
                    Ok(SnapshotInfo {
                        root_path: row.get(0)?,
                        last_indexed_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        let Some(info) = info else {
            return Ok(None);
        };

        let count = |sql: &str| -> AppResult<usize> {
            let n: i64 = tx.query_row(sql, params![workspace_id], |row| row.get(0))?;
            Ok(n as usize)
        };
        let files = count("SELECT COUNT(*) FROM indexed_files WHERE workspace_id = ?1")?;
        let symbols = count("SELECT COUNT(*) FROM indexed_symbols WHERE workspace_id = ?1")?;
        let dependencies =
            count("SELECT COUNT(*) FROM indexed_dependencies WHERE workspace_id = ?1")?;

        let languages: BTreeMap<String, usize> = {
            let mut stmt = tx.prepare(
                "SELECT language, COUNT(*) FROM indexed_files
                 WHERE workspace_id = ?1 AND language IS NOT NULL
                 GROUP BY language",
            )?;
            let rows = stmt
                .query_map(params![workspace_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                })?
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            rows
        };
        tx.commit()?;

        Ok(Some((
            info,
            IndexStats {
                files,
                symbols,
                dependencies,
                embedding_chunks: 0,
                languages,
            },
        )))
    }

    /// Symbols whose name contains `pattern` (case-insensitive).
    pub fn query_symbols(
        &self,
        workspace_id: &str,
        pattern: &str,
        limit: usize,
    ) -> AppResult<Vec<Symbol>> {
        let conn = self.get_connection()?;
        let like = format!("%{}%", escape_like(pattern));

        let mut stmt = conn.prepare(
            "SELECT name, kind, file_path, line
             FROM indexed_symbols
             WHERE workspace_id = ?1 AND name LIKE ?2 ESCAPE '\\'
             ORDER BY name, file_path, line
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![workspace_id, like, limit as i64], |row| {
                let kind: String = row.get(1)?;
                Ok(Symbol {
                    name: row.get(0)?,
                    kind: SymbolKind::parse(&kind)
                        .ok_or_else(|| unknown_value(1, "symbol kind", &kind))?,
                    file: row.get(2)?,
                    line: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
