//! Snapshot Poller
//!
//! Detects changes made outside the engine (by commands, editors, git) by
//! diffing `find` listings of `(path, mtime, size)` taken through the
//! executor. The first poll of a workspace only records a baseline, which is
//! persisted so a restart keeps diffing against it.
//!
//! Changes the sandbox already reported through the feed since the previous
//! poll are not reported a second time.

use dashmap::DashMap;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::feed::ChangeFeed;
use crate::models::change::ChangeType;
use crate::services::indexer::SKIP_DIRS;
use crate::services::sandbox::{shell_quote, ExecOptions, SandboxExecutor};
use crate::storage::database::{DbConnection, DbPool};
use crate::utils::error::{AppError, AppResult};

const LISTING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    mtime: String,
    size: i64,
}

pub struct SnapshotPoller {
    executor: Arc<dyn SandboxExecutor>,
    feed: Arc<ChangeFeed>,
    pool: DbPool,
    /// One poll at a time per workspace
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SnapshotPoller {
    pub fn new(executor: Arc<dyn SandboxExecutor>, feed: Arc<ChangeFeed>, pool: DbPool) -> Self {
        Self {
            executor,
            feed,
            pool,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, workspace_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Take a listing, record the differences to the previous one and store
    /// it as the new baseline. Returns the number of events recorded.
    pub async fn poll(&self, workspace_id: &str) -> AppResult<usize> {
        let lock = self.lock_for(workspace_id);
        let _guard = lock.lock().await;

        // Read before listing: anything the sandbox records from here on is
        // either in this listing or skipped by the next poll.
        let mark = self.feed.clock()?;
        let current = self.list_files(workspace_id).await?;

        let events: Vec<(String, ChangeType)> = match self.load_baseline(workspace_id)? {
            Some(previous_mark) => {
                let previous = self.load_snapshot(workspace_id)?;
                let recorded = self.feed.recorded_since(workspace_id, previous_mark)?;
                diff_snapshots(&previous, &current)
                    .into_iter()
                    .filter(|event| !recorded.contains(event))
                    .collect()
            }
            None => {
                debug!(workspace_id = %workspace_id, files = current.len(), "Recording initial snapshot");
                Vec::new()
            }
        };

        self.store_snapshot(workspace_id, &current, mark)?;
        self.feed.record_all(workspace_id, &events)?;

        if !events.is_empty() {
            debug!(workspace_id = %workspace_id, events = events.len(), "Detected file changes");
        }
        Ok(events.len())
    }

    async fn list_files(&self, workspace_id: &str) -> AppResult<HashMap<String, FileStamp>> {
        let mut command = String::from("find . -type f");
        for dir in SKIP_DIRS {
            command.push_str(&format!(" -not -path {}", shell_quote(&format!("*/{}/*", dir))));
        }
        command.push_str(" -printf '%P\\t%T@\\t%s\\n' 2>/dev/null");

        let result = self
            .executor
            .execute_command(
                workspace_id,
                &command,
                ExecOptions::new().with_timeout(LISTING_TIMEOUT),
            )
            .await?;
        if !result.succeeded() {
            warn!(workspace_id = %workspace_id, exit_code = result.exit_code, "File listing reported errors");
        }
        Ok(parse_listing(&result.stdout))
    }

    fn load_snapshot(&self, workspace_id: &str) -> AppResult<HashMap<String, FileStamp>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT path, mtime, size_bytes FROM file_snapshots WHERE workspace_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![workspace_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    FileStamp {
                        mtime: row.get(1)?,
                        size: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Feed clock at the previous poll, or `None` before the first one.
    fn load_baseline(&self, workspace_id: &str) -> AppResult<Option<i64>> {
        let conn = self.get_connection()?;
        let mark = conn
            .query_row(
                "SELECT feed_mark_ms FROM watch_baselines WHERE workspace_id = ?1",
                params![workspace_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(mark)
    }

    fn store_snapshot(
        &self,
        workspace_id: &str,
        files: &HashMap<String, FileStamp>,
        feed_mark: i64,
    ) -> AppResult<()> {
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM file_snapshots WHERE workspace_id = ?1",
            params![workspace_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO file_snapshots (workspace_id, path, mtime, size_bytes)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (path, stamp) in files {
                stmt.execute(params![workspace_id, path, stamp.mtime, stamp.size])?;
            }
        }
        tx.execute(
            "INSERT INTO watch_baselines (workspace_id, feed_mark_ms, polled_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(workspace_id) DO UPDATE SET
                feed_mark_ms = excluded.feed_mark_ms,
                polled_at = excluded.polled_at",
            params![workspace_id, feed_mark, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Parse `path\tmtime\tsize` lines; malformed lines are ignored.
fn parse_listing(stdout: &str) -> HashMap<String, FileStamp> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.rsplitn(3, '\t');
            let size = parts.next()?.trim().parse::<i64>().ok()?;
            let mtime = parts.next()?.to_string();
            let path = parts.next()?;
            if path.is_empty() {
                return None;
            }
            Some((path.to_string(), FileStamp { mtime, size }))
        })
        .collect()
}

/// Events turning `previous` into `current`, sorted by path for a stable order.
fn diff_snapshots(
    previous: &HashMap<String, FileStamp>,
    current: &HashMap<String, FileStamp>,
) -> Vec<(String, ChangeType)> {
    let mut events: Vec<(String, ChangeType)> = Vec::new();
    for (path, stamp) in current {
        match previous.get(path) {
            None => events.push((path.clone(), ChangeType::Created)),
            Some(old) if old != stamp => events.push((path.clone(), ChangeType::Modified)),
            Some(_) => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push((path.clone(), ChangeType::Deleted));
        }
    }
    events.sort_by(|a, b| a.0.cmp(&b.0));
    events
}
