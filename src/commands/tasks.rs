//! Background Task Commands
//!
//! Create, inspect and cancel tasks. Task lookups are authorized through the
//! task's workspace, so another owner's task is reported as not found.

use crate::models::response::CommandResponse;
use crate::models::task::{
    BackgroundTask, CancelTaskResponse, CreateTaskResponse, TaskStatus, TaskType,
};
use crate::state::EngineState;
use crate::utils::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Persist a pending task and start it in the background.
pub async fn create_task(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    task_type: TaskType,
    command: &str,
) -> CommandResponse<CreateTaskResponse> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state
            .scheduler()
            .create_task(workspace_id, task_type, command)
            .await
    }
    .await;
    result.into()
}

/// Most recent tasks of a workspace, newest first.
pub fn list_tasks(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    status: Option<TaskStatus>,
    limit: Option<usize>,
) -> CommandResponse<Vec<BackgroundTask>> {
    let result = state
        .directory()
        .authorize(workspace_id, owner)
        .and_then(|_| state.scheduler().list_tasks(workspace_id, status, limit));
    result.into()
}

pub fn get_task(state: &EngineState, owner: &str, task_id: &str) -> CommandResponse<BackgroundTask> {
    owned_task(state, owner, task_id).into()
}

/// Cancel a pending or running task. Terminal tasks report `cancelled: false`.
pub fn cancel_task(
    state: &EngineState,
    owner: &str,
    task_id: &str,
) -> CommandResponse<CancelTaskResponse> {
    let result =
        owned_task(state, owner, task_id).and_then(|task| state.scheduler().cancel_task(&task.id));
    result.into()
}

fn owned_task(state: &EngineState, owner: &str, task_id: &str) -> AppResult<BackgroundTask> {
    let task = state.scheduler().get_task(task_id)?;
    state
        .directory()
        .authorize(&task.workspace_id, owner)
        .map_err(|_| AppError::not_found(format!("task {}", task_id)))?;
    Ok(task)
}
