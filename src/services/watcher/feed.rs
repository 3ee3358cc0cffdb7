//! Change Feed
//!
//! Persisted per-workspace file change events. Timestamps are milliseconds
//! since the epoch and strictly increasing across the feed, so a caller's
//! watermark never skips or repeats an event. Recording `(path, type)` again
//! removes the earlier entry and appends the new one.

use rusqlite::params;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::error;

use crate::models::change::{ChangeType, FileChangeEvent};
use crate::services::sandbox::ChangeSink;
use crate::storage::database::{unknown_value, DbConnection, DbPool};
use crate::utils::error::{AppError, AppResult};

pub struct ChangeFeed {
    pool: DbPool,
    /// Last timestamp handed out. Held across the insert so events become
    /// visible in timestamp order.
    last_timestamp: Mutex<i64>,
}

impl ChangeFeed {
    pub fn new(pool: DbPool) -> AppResult<Self> {
        let last: i64 = {
            let conn = pool
                .get()
                .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;
            conn.query_row(
                "SELECT COALESCE(MAX(timestamp_ms), 0) FROM file_changes",
                [],
                |row| row.get(0),
            )?
        };
        Ok(Self {
            pool,
            last_timestamp: Mutex::new(last),
        })
    }

    fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Last timestamp handed out. Every event recorded later is newer.
    pub fn clock(&self) -> AppResult<i64> {
        self.last_timestamp
            .lock()
            .map(|last| *last)
            .map_err(|_| AppError::internal("change feed clock poisoned"))
    }

    /// Append events in order, each with a fresh timestamp.
    pub fn record_all(&self, workspace_id: &str, events: &[(String, ChangeType)]) -> AppResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut last = self
            .last_timestamp
            .lock()
            .map_err(|_| AppError::internal("change feed clock poisoned"))?;

        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        let mut next = *last;
        {
            let mut remove = tx.prepare(
                "DELETE FROM file_changes
                 WHERE workspace_id = ?1 AND path = ?2 AND change_type = ?3",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO file_changes (workspace_id, path, change_type, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (path, change_type) in events {
                next = chrono::Utc::now().timestamp_millis().max(next + 1);
                remove.execute(params![workspace_id, path, change_type.as_str()])?;
                insert.execute(params![workspace_id, path, change_type.as_str(), next])?;
            }
        }
        tx.commit()?;
        *last = next;
        Ok(())
    }

    pub fn record_change(&self, workspace_id: &str, path: &str, change_type: ChangeType) -> AppResult<()> {
        self.record_all(workspace_id, &[(path.to_string(), change_type)])
    }

    /// Events strictly after `since`, oldest first.
    pub fn events_since(&self, workspace_id: &str, since: i64) -> AppResult<Vec<FileChangeEvent>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT path, change_type, timestamp_ms FROM file_changes
             WHERE workspace_id = ?1 AND timestamp_ms > ?2
             ORDER BY timestamp_ms ASC",
        )?;
        let rows = stmt
            .query_map(params![workspace_id, since], |row| {
                Ok(FileChangeEvent {
                    path: row.get(0)?,
                    change_type: change_type_column(row, 1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `(path, type)` pairs recorded after `since`.
    pub fn recorded_since(&self, workspace_id: &str, since: i64) -> AppResult<HashSet<(String, ChangeType)>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT path, change_type FROM file_changes
             WHERE workspace_id = ?1 AND timestamp_ms > ?2",
        )?;
        let rows = stmt
            .query_map(params![workspace_id, since], |row| {
                Ok((row.get::<_, String>(0)?, change_type_column(row, 1)?))
            })?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(rows)
    }

    /// Delete events older than `cutoff_ms` across all workspaces.
    pub fn prune_before(&self, cutoff_ms: i64) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let deleted = conn.execute(
            "DELETE FROM file_changes WHERE timestamp_ms < ?1",
            params![cutoff_ms],
        )?;
        Ok(deleted)
    }
}

fn change_type_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<ChangeType> {
    let raw: String = row.get(index)?;
    ChangeType::parse(&raw).ok_or_else(|| unknown_value(index, "change type", &raw))
}

impl ChangeSink for ChangeFeed {
    fn record(&self, workspace_id: &str, path: &str, change_type: ChangeType) {
        if let Err(e) = self.record_change(workspace_id, path, change_type) {
            error!(workspace_id = %workspace_id, path = %path, error = %e, "Failed to record file change");
        }
    }
}
