//! Sandbox Commands
//!
//! Synchronous command runs and scoped file access for a workspace.

use std::time::Duration;

use crate::models::command::{CommandResult, PresetKind, RunCommandResponse};
use crate::models::response::CommandResponse;
use crate::services::sandbox::{run_preset as run_preset_command, ExecOptions, SandboxExecutor};
use crate::state::EngineState;
use crate::utils::error::{AppError, AppResult};

/// Run a well-known workspace command (install/build/test/lint) and wait for it.
pub async fn run_preset(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    preset: PresetKind,
) -> CommandResponse<RunCommandResponse> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        run_preset_command(state.sandbox().as_ref(), workspace_id, preset).await
    }
    .await;
    run_response(result)
}

/// Run an arbitrary shell command and wait for it.
pub async fn execute_command(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    command: &str,
    timeout_ms: Option<u64>,
) -> CommandResponse<RunCommandResponse> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        if command.trim().is_empty() {
            return Err(AppError::validation("command must not be empty"));
        }
        let mut options = ExecOptions::new();
        match timeout_ms {
            Some(0) => return Err(AppError::validation("timeout_ms must be positive")),
            Some(ms) => options = options.with_timeout(Duration::from_millis(ms)),
            None => {}
        }
        state
            .sandbox()
            .execute_command(workspace_id, command, options)
            .await
    }
    .await;
    run_response(result)
}

pub async fn read_file(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    path: &str,
) -> CommandResponse<String> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state.sandbox().read_file(workspace_id, path).await
    }
    .await;
    result.into()
}

pub async fn write_file(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    path: &str,
    content: &str,
) -> CommandResponse<()> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state.sandbox().write_file(workspace_id, path, content).await
    }
    .await;
    result.into()
}

pub async fn delete_file(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    path: &str,
) -> CommandResponse<()> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state.sandbox().delete_file(workspace_id, path).await
    }
    .await;
    result.into()
}

/// A timeout or cancellation still hands back the output captured so far.
fn run_response(result: AppResult<CommandResult>) -> CommandResponse<RunCommandResponse> {
    match result {
        Ok(output) => CommandResponse::ok(output.into()),
        Err(e) => {
            let mut response = CommandResponse::from_error(&e);
            if let Some(partial) = e.partial_result() {
                response.data = Some(RunCommandResponse {
                    success: false,
                    output: partial.stdout.clone(),
                    error: Some(e.to_string()),
                    execution_time: partial.execution_time_ms,
                });
            }
            response
        }
    }
}
