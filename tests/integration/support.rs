//! Shared fixture: an engine with workspace `ws1` owned by `alice` and
//! workspace `ws2` owned by `bob`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use workspace_engine::models::settings::{EngineConfig, WorkspaceEntry};
use workspace_engine::{dispatch, EngineState, Request};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub struct Engine {
    _dir: TempDir,
    pub ws1: PathBuf,
    pub ws2: PathBuf,
    pub state: EngineState,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(mut config: EngineConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let ws1 = dir.path().join("ws1");
        let ws2 = dir.path().join("ws2");
        std::fs::create_dir_all(&ws1).unwrap();
        std::fs::create_dir_all(&ws2).unwrap();

        config.workspaces = vec![
            WorkspaceEntry {
                id: "ws1".to_string(),
                owner: ALICE.to_string(),
                root: ws1.clone(),
            },
            WorkspaceEntry {
                id: "ws2".to_string(),
                owner: BOB.to_string(),
                root: ws2.clone(),
            },
        ];
        let state = EngineState::in_memory(config).expect("Failed to build engine state");

        Self {
            _dir: dir,
            ws1,
            ws2,
            state,
        }
    }

    pub async fn call(&self, owner: &str, request: Request) -> Value {
        dispatch(&self.state, owner, request).await
    }

    /// Poll `get_task` until the task is completed or failed.
    pub async fn wait_for_task(&self, owner: &str, task_id: &str) -> Value {
        for _ in 0..200 {
            let response = self
                .call(
                    owner,
                    Request::GetTask {
                        task_id: task_id.to_string(),
                    },
                )
                .await;
            let status = response["data"]["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return response["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("task {} did not finish", task_id);
    }
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

pub fn assert_error_kind(response: &Value, kind: &str) {
    assert_eq!(response["success"], false, "expected failure: {}", response);
    assert_eq!(response["error_kind"], kind, "unexpected error: {}", response);
}
