//! Background Task Models

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a background task.
///
/// Transitions only move forward: `pending -> running -> completed|failed`,
/// or `pending -> failed` when a task is cancelled before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Coarse progress percentage reported for the status.
    pub fn progress(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 10,
            TaskStatus::Completed | TaskStatus::Failed => 100,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a background task runs. Determines the default timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Install,
    Build,
    Test,
    Lint,
    Custom,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Install => "install",
            TaskType::Build => "build",
            TaskType::Test => "test",
            TaskType::Lint => "lint",
            TaskType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(TaskType::Install),
            "build" => Some(TaskType::Build),
            "test" => Some(TaskType::Test),
            "lint" => Some(TaskType::Lint),
            "custom" => Some(TaskType::Custom),
            _ => None,
        }
    }

    pub fn default_timeout(self) -> Duration {
        match self {
            TaskType::Build | TaskType::Test => Duration::from_secs(600),
            TaskType::Install => Duration::from_secs(300),
            TaskType::Lint | TaskType::Custom => Duration::from_secs(120),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: String,
    pub workspace_id: String,
    pub task_type: TaskType,
    pub command: String,
    pub status: TaskStatus,
    /// Output lines in arrival order (stdout and stderr interleaved)
    pub output: Vec<String>,
    pub progress: u8,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub cancelled: bool,
}
