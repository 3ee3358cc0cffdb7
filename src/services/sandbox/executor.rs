//! Local Sandbox
//!
//! Runs commands with `sh -c` under the workspace root and streams their
//! output line by line. Uses spawn + `select!` so a timeout or cancellation
//! can kill the child and still return what was captured so far.
//!
//! On unix each command leads its own process group, and a kill signals the
//! whole group so grandchildren (`npm` → `node`, nested shells) die with it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::workspace::WorkspaceDirectory;
use super::{ChangeSink, ExecOptions, OutputCallback, SandboxExecutor};
use crate::models::change::ChangeType;
use crate::models::command::CommandResult;
use crate::models::settings::SandboxSettings;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{relative_to_root, resolve_within_root};

/// How long stream readers may keep draining after a normal exit.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How long stream readers may keep draining after the child was killed.
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Captured output for one stream, capped at `limit` bytes.
#[derive(Debug)]
struct CappedBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

impl CappedBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &str) {
        if self.truncated {
            return;
        }
        let room = self.limit.saturating_sub(self.text.len());
        if chunk.len() <= room {
            self.text.push_str(chunk);
            return;
        }
        let mut cut = room;
        while cut > 0 && !chunk.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&chunk[..cut]);
        self.text.push_str("\n[output truncated]\n");
        self.truncated = true;
    }
}

type SharedBuffer = Arc<Mutex<CappedBuffer>>;

/// Read `stream` line by line into `buffer`, invoking `callback` per line.
fn spawn_reader<R>(stream: R, buffer: SharedBuffer, callback: Option<OutputCallback>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    if let Some(cb) = &callback {
                        cb(line.trim_end_matches(['\n', '\r']));
                    }
                    buffer.lock().await.push(&line);
                }
                Err(e) => {
                    debug!(error = %e, "Output stream closed with error");
                    break;
                }
            }
        }
    })
}

/// Wait for the stream readers up to `grace`, then abort any still running.
async fn settle_readers(readers: Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut handle in readers {
        if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

async fn snapshot(
    stdout: &SharedBuffer,
    stderr: &SharedBuffer,
    exit_code: i32,
    started: Instant,
) -> CommandResult {
    CommandResult {
        stdout: stdout.lock().await.text.clone(),
        stderr: stderr.lock().await.text.clone(),
        exit_code,
        execution_time_ms: started.elapsed().as_millis() as u64,
    }
}

/// Kill the command and everything it spawned.
async fn kill_process_group(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        // SAFETY: killpg only sends a signal to the group created at spawn.
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Child already gone");
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Sandbox that runs commands directly on the host under the workspace root.
pub struct LocalSandbox {
    directory: Arc<WorkspaceDirectory>,
    settings: SandboxSettings,
    changes: Option<Arc<dyn ChangeSink>>,
}

impl LocalSandbox {
    pub fn new(directory: Arc<WorkspaceDirectory>, settings: SandboxSettings) -> Self {
        Self {
            directory,
            settings,
            changes: None,
        }
    }

    /// Report file writes and deletes to `sink`.
    pub fn with_change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.changes = Some(sink);
        self
    }

    pub fn directory(&self) -> &Arc<WorkspaceDirectory> {
        &self.directory
    }

    fn workspace_root(&self, workspace_id: &str) -> AppResult<PathBuf> {
        let ws = self.directory.resolve(workspace_id)?;
        if !ws.root.is_dir() {
            return Err(AppError::not_found(format!(
                "workspace {} root {} no longer exists",
                workspace_id,
                ws.root.display()
            )));
        }
        Ok(ws.root)
    }

    fn record_change(&self, workspace_id: &str, root: &std::path::Path, path: &std::path::Path, change: ChangeType) {
        if let Some(sink) = &self.changes {
            if let Some(rel) = relative_to_root(root, path) {
                sink.record(workspace_id, &rel, change);
            }
        }
    }
}

#[async_trait]
impl SandboxExecutor for LocalSandbox {
    async fn execute_command(
        &self,
        workspace_id: &str,
        command: &str,
        options: ExecOptions,
    ) -> AppResult<CommandResult> {
        let root = self.workspace_root(workspace_id)?;
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.settings.default_timeout());
        let started = Instant::now();

        debug!(workspace_id = %workspace_id, command = %command, timeout_ms = timeout.as_millis() as u64, "Executing command");

        let mut cmd = Command::new(&self.settings.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::sandbox(format!("Failed to spawn command: {}", e)))?;
        let pgid = child.id();

        let stdout_buf: SharedBuffer = Arc::new(Mutex::new(CappedBuffer::new(self.settings.max_output_bytes)));
        let stderr_buf: SharedBuffer = Arc::new(Mutex::new(CappedBuffer::new(self.settings.max_output_bytes)));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&stdout_buf), options.on_stdout.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&stderr_buf), options.on_stderr.clone()));
        }

        let cancel = options.cancel.clone().unwrap_or_else(CancellationToken::new);
        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        match outcome {
            Outcome::Exited(Ok(status)) => {
                settle_readers(readers, DRAIN_GRACE).await;
                let exit_code = status.code().unwrap_or(-1);
                let result = snapshot(&stdout_buf, &stderr_buf, exit_code, started).await;
                info!(
                    workspace_id = %workspace_id,
                    exit_code,
                    elapsed_ms = result.execution_time_ms,
                    "Command finished"
                );
                Ok(result)
            }
            Outcome::Exited(Err(e)) => {
                settle_readers(readers, KILL_GRACE).await;
                Err(AppError::sandbox(format!("Failed to wait for command: {}", e)))
            }
            Outcome::TimedOut => {
                kill_process_group(&mut child, pgid).await;
                settle_readers(readers, KILL_GRACE).await;
                let partial = snapshot(&stdout_buf, &stderr_buf, -1, started).await;
                warn!(workspace_id = %workspace_id, command = %command, "Command timed out");
                Err(AppError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                    partial: Box::new(partial),
                })
            }
            Outcome::Cancelled => {
                kill_process_group(&mut child, pgid).await;
                settle_readers(readers, KILL_GRACE).await;
                let partial = snapshot(&stdout_buf, &stderr_buf, -1, started).await;
                info!(workspace_id = %workspace_id, "Command cancelled");
                Err(AppError::Cancelled {
                    partial: Box::new(partial),
                })
            }
        }
    }

    async fn read_file(&self, workspace_id: &str, path: &str) -> AppResult<String> {
        let full = self.resolve_path(workspace_id, path)?;
        let bytes = match tokio::fs::read(&full).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found(format!("file {}", path)));
            }
            Err(e) => return Err(AppError::sandbox(format!("Failed to read {}: {}", path, e))),
        };
        String::from_utf8(bytes)
            .map_err(|_| AppError::validation(format!("{} is not valid UTF-8", path)))
    }

    async fn write_file(&self, workspace_id: &str, path: &str, content: &str) -> AppResult<()> {
        let root = self.workspace_root(workspace_id)?;
        let full = resolve_within_root(&root, path)?;
        if full == root {
            return Err(AppError::validation("cannot write to the workspace root"));
        }

        let existed = tokio::fs::try_exists(&full).await.unwrap_or(false);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| AppError::sandbox(format!("Failed to write {}: {}", path, e)))?;

        let change = if existed {
            ChangeType::Modified
        } else {
            ChangeType::Created
        };
        self.record_change(workspace_id, &root, &full, change);
        Ok(())
    }

    async fn delete_file(&self, workspace_id: &str, path: &str) -> AppResult<()> {
        let root = self.workspace_root(workspace_id)?;
        let full = resolve_within_root(&root, path)?;

        let meta = match tokio::fs::symlink_metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found(format!("file {}", path)));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(AppError::validation(format!("{} is a directory", path)));
        }

        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| AppError::sandbox(format!("Failed to delete {}: {}", path, e)))?;
        self.record_change(workspace_id, &root, &full, ChangeType::Deleted);
        Ok(())
    }

    fn resolve_path(&self, workspace_id: &str, path: &str) -> AppResult<PathBuf> {
        let root = self.workspace_root(workspace_id)?;
        resolve_within_root(&root, path)
    }
}
