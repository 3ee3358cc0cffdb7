//! File Change Watcher
//!
//! Poll-based change feed. Events come from the sandbox's own file
//! operations (the feed is installed as its `ChangeSink`) and from snapshot
//! polls that catch everything else.

pub mod feed;
pub mod poller;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::change::FileChangeEvent;
use crate::models::settings::WatcherSettings;
use crate::services::sandbox::{SandboxExecutor, WorkspaceDirectory};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

pub use feed::ChangeFeed;
pub use poller::SnapshotPoller;

pub struct FileWatcher {
    feed: Arc<ChangeFeed>,
    poller: SnapshotPoller,
    settings: WatcherSettings,
}

impl FileWatcher {
    pub fn new(
        pool: DbPool,
        executor: Arc<dyn SandboxExecutor>,
        feed: Arc<ChangeFeed>,
        settings: WatcherSettings,
    ) -> Self {
        Self {
            poller: SnapshotPoller::new(executor, Arc::clone(&feed), pool),
            feed,
            settings,
        }
    }

    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    /// Poll the workspace once, then return events after `since`, oldest first.
    ///
    /// A failed poll is logged and the already-recorded events are still
    /// returned; an unknown workspace is an error.
    pub async fn changes_since(
        &self,
        workspace_id: &str,
        since: i64,
    ) -> AppResult<Vec<FileChangeEvent>> {
        match self.poller.poll(workspace_id).await {
            Ok(_) => {}
            Err(e @ (AppError::NotFound(_) | AppError::PathViolation(_))) => return Err(e),
            Err(e) => warn!(workspace_id = %workspace_id, error = %e, "Snapshot poll failed"),
        }
        self.prune_expired();
        self.feed.events_since(workspace_id, since)
    }

    /// Recorded events after `since` without polling first.
    pub fn events_since(&self, workspace_id: &str, since: i64) -> AppResult<Vec<FileChangeEvent>> {
        self.feed.events_since(workspace_id, since)
    }

    fn prune_expired(&self) {
        let retention_ms = self.settings.retention().as_millis() as i64;
        let cutoff = chrono::Utc::now().timestamp_millis() - retention_ms;
        match self.feed.prune_before(cutoff) {
            Ok(0) => {}
            Ok(n) => debug!(pruned = n, "Pruned expired change events"),
            Err(e) => warn!(error = %e, "Failed to prune change events"),
        }
    }

    /// Poll every registered workspace each `poll_interval` until cancelled.
    pub fn spawn_poll_loop(
        self: &Arc<Self>,
        directory: Arc<WorkspaceDirectory>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let watcher = Arc::clone(self);
        let interval = self.settings.poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                for workspace in directory.list() {
                    if let Err(e) = watcher.poller.poll(&workspace.id).await {
                        warn!(workspace_id = %workspace.id, error = %e, "Background poll failed");
                    }
                }
                watcher.prune_expired();
            }
            debug!("Change poll loop stopped");
        })
    }
}
