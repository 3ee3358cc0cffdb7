//! Task Scheduler
//!
//! Wraps executor calls in a persisted, asynchronous task lifecycle.
//! `create_task` returns as soon as the `pending` row is written; the command
//! runs on a spawned tokio task once a per-workspace slot frees up.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::registry::{TaskHandle, TaskRegistry};
use super::store::TaskStore;
use crate::models::settings::TaskSettings;
use crate::models::task::{
    BackgroundTask, CancelTaskResponse, CreateTaskResponse, TaskStatus, TaskType,
};
use crate::services::sandbox::{ExecOptions, OutputCallback, SandboxExecutor};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Clone)]
pub struct TaskScheduler {
    store: TaskStore,
    executor: Arc<dyn SandboxExecutor>,
    registry: Arc<dyn TaskRegistry>,
    slots: Arc<DashMap<String, Arc<Semaphore>>>,
    settings: TaskSettings,
}

impl TaskScheduler {
    pub fn new(
        pool: DbPool,
        executor: Arc<dyn SandboxExecutor>,
        registry: Arc<dyn TaskRegistry>,
        settings: TaskSettings,
    ) -> Self {
        Self {
            store: TaskStore::new(pool),
            executor,
            registry,
            slots: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Fail tasks a previous process left unfinished. Call once at startup.
    pub fn recover_interrupted(&self) -> AppResult<usize> {
        let recovered = self.store.recover_interrupted()?;
        if recovered > 0 {
            warn!(count = recovered, "Marked interrupted tasks as failed");
        }
        Ok(recovered)
    }

    /// Persist a `pending` task and schedule it. Returns immediately.
    pub async fn create_task(
        &self,
        workspace_id: &str,
        task_type: TaskType,
        command: &str,
    ) -> AppResult<CreateTaskResponse> {
        if command.trim().is_empty() {
            return Err(AppError::validation("command must not be empty"));
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        self.store
            .insert(&task_id, workspace_id, task_type, command)?;

        let cancel = CancellationToken::new();
        self.registry.insert(
            &task_id,
            TaskHandle {
                workspace_id: workspace_id.to_string(),
                cancel: cancel.clone(),
            },
        );

        info!(task_id = %task_id, workspace_id = %workspace_id, task_type = %task_type, "Task created");

        let scheduler = self.clone();
        let id = task_id.clone();
        let ws = workspace_id.to_string();
        let cmd = command.to_string();
        tokio::spawn(async move {
            scheduler.run_task(id, ws, task_type, cmd, cancel).await;
        });

        Ok(CreateTaskResponse {
            task_id,
            status: TaskStatus::Pending,
        })
    }

    pub fn get_task(&self, task_id: &str) -> AppResult<BackgroundTask> {
        self.store
            .get(task_id)?
            .ok_or_else(|| AppError::not_found(format!("task {}", task_id)))
    }

    /// Tasks for a workspace, newest first. `limit` defaults to 20, max 100.
    pub fn list_tasks(
        &self,
        workspace_id: &str,
        status: Option<TaskStatus>,
        limit: Option<usize>,
    ) -> AppResult<Vec<BackgroundTask>> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        self.store.list(workspace_id, status, limit)
    }

    /// Request cancellation. Returns `cancelled: false` for finished tasks.
    ///
    /// A task whose handle has left the registry is failed directly while it
    /// is still pending. A running task without a handle cannot be stopped
    /// from here and is reported as an error.
    pub fn cancel_task(&self, task_id: &str) -> AppResult<CancelTaskResponse> {
        let task = self.get_task(task_id)?;
        if task.status.is_terminal() {
            return Ok(CancelTaskResponse { cancelled: false });
        }

        if let Some(handle) = self.registry.get(task_id) {
            handle.cancel.cancel();
            info!(task_id = %task_id, "Task cancellation requested");
            return Ok(CancelTaskResponse { cancelled: true });
        }

        if self.store.fail_pending(task_id, "cancelled before start")? {
            warn!(task_id = %task_id, "Cancelled queued task without a live handle");
            return Ok(CancelTaskResponse { cancelled: true });
        }

        // Started in the meantime; the runner registers its handle first.
        if let Some(handle) = self.registry.get(task_id) {
            handle.cancel.cancel();
            info!(task_id = %task_id, "Task cancellation requested");
            return Ok(CancelTaskResponse { cancelled: true });
        }
        if self.get_task(task_id)?.status.is_terminal() {
            return Ok(CancelTaskResponse { cancelled: false });
        }
        Err(AppError::internal(format!(
            "task {} is running but its cancellation handle has expired",
            task_id
        )))
    }

    fn slot_for(&self, workspace_id: &str) -> Arc<Semaphore> {
        self.slots
            .entry(workspace_id.to_string())
            .or_insert_with(|| {
                Arc::new(Semaphore::new(self.settings.max_concurrent_per_workspace.max(1)))
            })
            .clone()
    }

    async fn run_task(
        self,
        task_id: String,
        workspace_id: String,
        task_type: TaskType,
        command: String,
        cancel: CancellationToken,
    ) {
        let slot = self.slot_for(&workspace_id);
        let permit = tokio::select! {
            permit = slot.acquire_owned() => permit.ok(),
            _ = cancel.cancelled() => None,
        };
        let Some(_permit) = permit else {
            self.finish_failed(&task_id, "cancelled before start");
            self.registry.remove(&task_id);
            return;
        };

        // Re-register so queue time does not count against the handle's TTL.
        self.registry.insert(
            &task_id,
            TaskHandle {
                workspace_id: workspace_id.clone(),
                cancel: cancel.clone(),
            },
        );

        match self.store.mark_running(&task_id) {
            Ok(true) => debug!(task_id = %task_id, "Task running"),
            Ok(false) => {
                debug!(task_id = %task_id, "Task no longer pending, skipping");
                self.registry.remove(&task_id);
                return;
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Failed to mark task running");
                self.finish_failed(&task_id, &e.to_string());
                self.registry.remove(&task_id);
                return;
            }
        }

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let flusher = tokio::spawn(flush_output(
            self.store.clone(),
            task_id.clone(),
            rx,
            self.settings.flush_every.max(1),
        ));

        let on_stdout: OutputCallback = {
            let tx = tx.clone();
            Arc::new(move |line: &str| {
                let _ = tx.send(line.to_string());
            })
        };
        let on_stderr: OutputCallback = Arc::new(move |line: &str| {
            let _ = tx.send(line.to_string());
        });

        let options = ExecOptions::new()
            .with_timeout(task_type.default_timeout())
            .with_stdout(on_stdout)
            .with_stderr(on_stderr)
            .with_cancel(cancel);
        let result = self
            .executor
            .execute_command(&workspace_id, &command, options)
            .await;

        // Every sender is gone once the executor returns; wait for the last flush.
        if let Err(e) = flusher.await {
            error!(task_id = %task_id, error = %e, "Output flusher panicked");
        }

        match result {
            Ok(r) if r.succeeded() => match self.store.mark_completed(&task_id) {
                Ok(_) => info!(task_id = %task_id, elapsed_ms = r.execution_time_ms, "Task completed"),
                Err(e) => error!(task_id = %task_id, error = %e, "Failed to mark task completed"),
            },
            Ok(r) => {
                let message = format!("exited with code {}", r.exit_code);
                info!(task_id = %task_id, exit_code = r.exit_code, "Task failed");
                self.finish_failed(&task_id, &message);
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task failed");
                self.finish_failed(&task_id, &e.to_string());
            }
        }

        self.registry.remove(&task_id);
    }

    fn finish_failed(&self, task_id: &str, message: &str) {
        if let Err(e) = self.store.mark_failed(task_id, message) {
            error!(task_id = %task_id, error = %e, "Failed to mark task failed");
        }
    }
}

/// Drain output lines, writing them to the store every `flush_every` lines
/// and once more when the channel closes.
async fn flush_output(
    store: TaskStore,
    task_id: String,
    mut rx: mpsc::UnboundedReceiver<String>,
    flush_every: usize,
) {
    let mut pending = Vec::with_capacity(flush_every);
    while let Some(line) = rx.recv().await {
        pending.push(line);
        if pending.len() >= flush_every {
            if let Err(e) = store.append_output(&task_id, &pending) {
                warn!(task_id = %task_id, error = %e, "Failed to flush task output");
            }
            pending.clear();
        }
    }
    if let Err(e) = store.append_output(&task_id, &pending) {
        warn!(task_id = %task_id, error = %e, "Failed to flush task output");
    }
}
