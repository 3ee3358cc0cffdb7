//! Command Execution Models

use serde::{Deserialize, Serialize};

/// Outcome of one command invocation inside a workspace.
///
/// A non-zero `exit_code` is an ordinary result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Well-known workspace commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetKind {
    Install,
    Build,
    Test,
    Lint,
}

impl PresetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PresetKind::Install => "install",
            PresetKind::Build => "build",
            PresetKind::Test => "test",
            PresetKind::Lint => "lint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(PresetKind::Install),
            "build" => Some(PresetKind::Build),
            "test" => Some(PresetKind::Test),
            "lint" => Some(PresetKind::Lint),
            _ => None,
        }
    }
}

/// Synchronous run response for presets and ad-hoc commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandResponse {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    /// Wall-clock milliseconds
    pub execution_time: u64,
}

impl From<CommandResult> for RunCommandResponse {
    fn from(result: CommandResult) -> Self {
        let success = result.succeeded();
        let error = if success {
            None
        } else if result.stderr.trim().is_empty() {
            Some(format!("exited with code {}", result.exit_code))
        } else {
            Some(result.stderr)
        };
        Self {
            success,
            output: result.stdout,
            error,
            execution_time: result.execution_time_ms,
        }
    }
}
