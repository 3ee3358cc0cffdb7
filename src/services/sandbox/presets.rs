//! Command Presets
//!
//! Install/build/test/lint shortcuts. The project type is detected from the
//! marker file found at the workspace root (read through the executor), and
//! each preset runs with its own default timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ExecOptions, SandboxExecutor};
use crate::models::command::{CommandResult, PresetKind};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    NodeJs,
    Rust,
    Python,
    Go,
}

/// Marker files checked in order; the first one present wins.
const MARKERS: &[(&str, ProjectType)] = &[
    ("package.json", ProjectType::NodeJs),
    ("Cargo.toml", ProjectType::Rust),
    ("pyproject.toml", ProjectType::Python),
    ("requirements.txt", ProjectType::Python),
    ("go.mod", ProjectType::Go),
];

/// Detect the project type from root marker files.
///
/// Returns `None` when no marker is present.
pub async fn detect_project_type(
    executor: &dyn SandboxExecutor,
    workspace_id: &str,
) -> AppResult<Option<ProjectType>> {
    for (marker, project_type) in MARKERS {
        match executor.read_file(workspace_id, marker).await {
            Ok(_) => {
                debug!(workspace_id = %workspace_id, marker = %marker, "Detected project type");
                return Ok(Some(*project_type));
            }
            Err(AppError::NotFound(_)) => continue,
            // A marker that exists but is unreadable still identifies the project
            Err(AppError::Validation(_)) => return Ok(Some(*project_type)),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Shell command for a preset on a project type.
pub fn preset_command(project_type: ProjectType, kind: PresetKind) -> &'static str {
    match (project_type, kind) {
        (ProjectType::NodeJs, PresetKind::Install) => "npm install",
        (ProjectType::NodeJs, PresetKind::Build) => "npm run build",
        (ProjectType::NodeJs, PresetKind::Test) => "npm test",
        (ProjectType::NodeJs, PresetKind::Lint) => "npm run lint",

        (ProjectType::Rust, PresetKind::Install) => "cargo fetch",
        (ProjectType::Rust, PresetKind::Build) => "cargo build",
        (ProjectType::Rust, PresetKind::Test) => "cargo test",
        (ProjectType::Rust, PresetKind::Lint) => "cargo clippy",

        (ProjectType::Python, PresetKind::Install) => {
            "if [ -f requirements.txt ]; then pip install -r requirements.txt; else pip install -e .; fi"
        }
        (ProjectType::Python, PresetKind::Build) => "python -m compileall -q .",
        (ProjectType::Python, PresetKind::Test) => "pytest",
        (ProjectType::Python, PresetKind::Lint) => "ruff check .",

        (ProjectType::Go, PresetKind::Install) => "go mod download",
        (ProjectType::Go, PresetKind::Build) => "go build ./...",
        (ProjectType::Go, PresetKind::Test) => "go test ./...",
        (ProjectType::Go, PresetKind::Lint) => "go vet ./...",
    }
}

pub fn preset_timeout(kind: PresetKind) -> Duration {
    match kind {
        PresetKind::Build | PresetKind::Test => Duration::from_secs(600),
        PresetKind::Install => Duration::from_secs(300),
        PresetKind::Lint => Duration::from_secs(120),
    }
}

/// Run a preset, falling back to npm when the project type is unknown.
pub async fn run_preset(
    executor: &dyn SandboxExecutor,
    workspace_id: &str,
    kind: PresetKind,
) -> AppResult<CommandResult> {
    let project_type = detect_project_type(executor, workspace_id)
        .await?
        .unwrap_or(ProjectType::NodeJs);
    let command = preset_command(project_type, kind);
    let options = ExecOptions::new().with_timeout(preset_timeout(kind));
    executor.execute_command(workspace_id, command, options).await
}

pub async fn install_dependencies(
    executor: &dyn SandboxExecutor,
    workspace_id: &str,
) -> AppResult<CommandResult> {
    run_preset(executor, workspace_id, PresetKind::Install).await
}

pub async fn run_build(executor: &dyn SandboxExecutor, workspace_id: &str) -> AppResult<CommandResult> {
    run_preset(executor, workspace_id, PresetKind::Build).await
}

pub async fn run_tests(executor: &dyn SandboxExecutor, workspace_id: &str) -> AppResult<CommandResult> {
    run_preset(executor, workspace_id, PresetKind::Test).await
}

pub async fn run_lint(executor: &dyn SandboxExecutor, workspace_id: &str) -> AppResult<CommandResult> {
    run_preset(executor, workspace_id, PresetKind::Lint).await
}
