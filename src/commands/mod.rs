//! Engine Commands
//!
//! Every operation is a variant of the tagged `Request` enum and is routed by
//! a static match in `dispatch`. Handlers take the authenticated owner and
//! answer with a `CommandResponse`.
//!
//! Wire format: `{"op": "create_task", "workspace_id": "...", ...}`.

pub mod codebase;
pub mod file_changes;
pub mod sandbox;
pub mod tasks;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::models::command::PresetKind;
use crate::models::response::CommandResponse;
use crate::models::task::{TaskStatus, TaskType};
use crate::state::EngineState;

fn default_index_path() -> String {
    ".".to_string()
}

/// A single engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateTask {
        workspace_id: String,
        task_type: TaskType,
        command: String,
    },
    ListTasks {
        workspace_id: String,
        #[serde(default)]
        status: Option<TaskStatus>,
        #[serde(default)]
        limit: Option<usize>,
    },
    GetTask {
        task_id: String,
    },
    CancelTask {
        task_id: String,
    },
    RunPreset {
        workspace_id: String,
        preset: PresetKind,
    },
    ExecuteCommand {
        workspace_id: String,
        command: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    ReadFile {
        workspace_id: String,
        path: String,
    },
    WriteFile {
        workspace_id: String,
        path: String,
        content: String,
    },
    DeleteFile {
        workspace_id: String,
        path: String,
    },
    BuildIndex {
        workspace_id: String,
        #[serde(default = "default_index_path")]
        path: String,
        #[serde(default)]
        include_embeddings: bool,
    },
    IndexStatus {
        workspace_id: String,
    },
    QuerySymbols {
        workspace_id: String,
        pattern: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    Search {
        workspace_id: String,
        query: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    PollChanges {
        workspace_id: String,
        #[serde(default)]
        since: i64,
    },
}

impl Request {
    /// The `op` tag of this request.
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateTask { .. } => "create_task",
            Request::ListTasks { .. } => "list_tasks",
            Request::GetTask { .. } => "get_task",
            Request::CancelTask { .. } => "cancel_task",
            Request::RunPreset { .. } => "run_preset",
            Request::ExecuteCommand { .. } => "execute_command",
            Request::ReadFile { .. } => "read_file",
            Request::WriteFile { .. } => "write_file",
            Request::DeleteFile { .. } => "delete_file",
            Request::BuildIndex { .. } => "build_index",
            Request::IndexStatus { .. } => "index_status",
            Request::QuerySymbols { .. } => "query_symbols",
            Request::Search { .. } => "search",
            Request::PollChanges { .. } => "poll_changes",
        }
    }
}

/// Route `request` to its handler on behalf of `owner`.
pub async fn dispatch(state: &EngineState, owner: &str, request: Request) -> Value {
    debug!(op = request.name(), owner = %owner, "Dispatching request");
    match request {
        Request::CreateTask {
            workspace_id,
            task_type,
            command,
        } => respond(tasks::create_task(state, owner, &workspace_id, task_type, &command).await),
        Request::ListTasks {
            workspace_id,
            status,
            limit,
        } => respond(tasks::list_tasks(state, owner, &workspace_id, status, limit)),
        Request::GetTask { task_id } => respond(tasks::get_task(state, owner, &task_id)),
        Request::CancelTask { task_id } => respond(tasks::cancel_task(state, owner, &task_id)),
        Request::RunPreset {
            workspace_id,
            preset,
        } => respond(sandbox::run_preset(state, owner, &workspace_id, preset).await),
        Request::ExecuteCommand {
            workspace_id,
            command,
            timeout_ms,
        } => respond(
            sandbox::execute_command(state, owner, &workspace_id, &command, timeout_ms).await,
        ),
        Request::ReadFile { workspace_id, path } => {
            respond(sandbox::read_file(state, owner, &workspace_id, &path).await)
        }
        Request::WriteFile {
            workspace_id,
            path,
            content,
        } => respond(sandbox::write_file(state, owner, &workspace_id, &path, &content).await),
        Request::DeleteFile { workspace_id, path } => {
            respond(sandbox::delete_file(state, owner, &workspace_id, &path).await)
        }
        Request::BuildIndex {
            workspace_id,
            path,
            include_embeddings,
        } => respond(
            codebase::build_index(state, owner, &workspace_id, &path, include_embeddings).await,
        ),
        Request::IndexStatus { workspace_id } => {
            respond(codebase::index_status(state, owner, &workspace_id))
        }
        Request::QuerySymbols {
            workspace_id,
            pattern,
            limit,
        } => respond(codebase::query_symbols(
            state,
            owner,
            &workspace_id,
            &pattern,
            limit,
        )),
        Request::Search {
            workspace_id,
            query,
            limit,
        } => respond(codebase::semantic_search(state, owner, &workspace_id, &query, limit).await),
        Request::PollChanges {
            workspace_id,
            since,
        } => respond(file_changes::poll_changes(state, owner, &workspace_id, since).await),
    }
}

/// Parse a JSON request and dispatch it. Malformed input is a validation error.
pub async fn dispatch_json(state: &EngineState, owner: &str, input: &str) -> Value {
    match serde_json::from_str::<Request>(input) {
        Ok(request) => dispatch(state, owner, request).await,
        Err(e) => json!({
            "success": false,
            "data": null,
            "error": format!("Validation error: invalid request: {}", e),
            "error_kind": "validation",
        }),
    }
}

fn respond<T: Serialize>(response: CommandResponse<T>) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|e| {
        json!({
            "success": false,
            "data": null,
            "error": format!("Internal error: failed to serialize response: {}", e),
            "error_kind": "internal",
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_value(json!({
            "op": "create_task",
            "workspace_id": "ws1",
            "task_type": "build",
            "command": "npm run build",
        }))
        .unwrap();
        assert_eq!(
            request,
            Request::CreateTask {
                workspace_id: "ws1".to_string(),
                task_type: TaskType::Build,
                command: "npm run build".to_string(),
            }
        );
        assert_eq!(request.name(), "create_task");
    }

    #[test]
    fn test_request_defaults() {
        let request: Request =
            serde_json::from_value(json!({ "op": "build_index", "workspace_id": "ws1" })).unwrap();
        assert_eq!(
            request,
            Request::BuildIndex {
                workspace_id: "ws1".to_string(),
                path: ".".to_string(),
                include_embeddings: false,
            }
        );

        let request: Request =
            serde_json::from_value(json!({ "op": "poll_changes", "workspace_id": "ws1" })).unwrap();
        assert_eq!(
            request,
            Request::PollChanges {
                workspace_id: "ws1".to_string(),
                since: 0,
            }
        );
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let parsed = serde_json::from_value::<Request>(json!({ "op": "format_disk" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_name_matches_tag() {
        let request = Request::ListTasks {
            workspace_id: "ws1".to_string(),
            status: Some(TaskStatus::Running),
            limit: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], request.name());
        assert_eq!(json["status"], "running");
    }
}
