//! Sandbox Executor
//!
//! Runs commands inside a workspace and gives scoped access to its files.
//! The isolation primitive (container, VM, plain directory) sits behind the
//! `SandboxExecutor` trait; `LocalSandbox` runs commands directly under the
//! workspace root on the host.

pub mod executor;
pub mod presets;
pub mod workspace;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::change::ChangeType;
use crate::models::command::CommandResult;
use crate::utils::error::AppResult;

pub use executor::LocalSandbox;
pub use presets::{
    detect_project_type, install_dependencies, preset_command, preset_timeout, run_build, run_lint,
    run_preset, run_tests, ProjectType,
};
pub use workspace::{Workspace, WorkspaceDirectory};

/// Receives each output line (without its line terminator) as it arrives.
///
/// Called inline from the stream reader, so it must be cheap: append to a
/// buffer or push to a channel.
pub type OutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-invocation options for `execute_command`.
#[derive(Clone, Default)]
pub struct ExecOptions {
    /// Falls back to the sandbox default when `None`
    pub timeout: Option<Duration>,
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
    pub cancel: Option<CancellationToken>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stdout(mut self, callback: OutputCallback) -> Self {
        self.on_stdout = Some(callback);
        self
    }

    pub fn with_stderr(mut self, callback: OutputCallback) -> Self {
        self.on_stderr = Some(callback);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl std::fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOptions")
            .field("timeout", &self.timeout)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

/// Observer notified of file mutations made through the executor.
pub trait ChangeSink: Send + Sync {
    fn record(&self, workspace_id: &str, path: &str, change_type: ChangeType);
}

/// Command execution and scoped file access for a workspace.
///
/// A non-zero exit code is returned as data. Errors are reserved for
/// infrastructure failures, timeouts, cancellation and path violations.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Run `command` through the shell with the workspace root as cwd.
    async fn execute_command(
        &self,
        workspace_id: &str,
        command: &str,
        options: ExecOptions,
    ) -> AppResult<CommandResult>;

    /// Read a UTF-8 file relative to the workspace root.
    async fn read_file(&self, workspace_id: &str, path: &str) -> AppResult<String>;

    /// Write a file relative to the workspace root, creating parent directories.
    async fn write_file(&self, workspace_id: &str, path: &str, content: &str) -> AppResult<()>;

    /// Delete a file relative to the workspace root.
    async fn delete_file(&self, workspace_id: &str, path: &str) -> AppResult<()>;

    /// Resolve a workspace-relative path, rejecting escapes from the root.
    fn resolve_path(&self, workspace_id: &str, path: &str) -> AppResult<PathBuf>;
}

/// Quote `value` for inclusion in a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("src/main.ts"), "src/main.ts");
        assert_eq!(shell_quote("my file"), "'my file'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_exec_options_builder() {
        let token = CancellationToken::new();
        let options = ExecOptions::new()
            .with_timeout(Duration::from_secs(3))
            .with_cancel(token);
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert!(options.cancel.is_some());
        assert!(options.on_stdout.is_none());
    }
}
