//! Background Task Integration Tests
//!
//! Task lifecycle through `dispatch`: creation returns immediately, output
//! and terminal state are persisted, cancellation kills the process, and
//! tasks are only visible to the workspace owner.

use std::time::Duration;

use workspace_engine::models::task::{TaskStatus, TaskType};
use workspace_engine::Request;

use super::support::{assert_error_kind, Engine, ALICE, BOB};

fn create(workspace_id: &str, task_type: TaskType, command: &str) -> Request {
    Request::CreateTask {
        workspace_id: workspace_id.to_string(),
        task_type,
        command: command.to_string(),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_task_completes_and_is_listed() {
    let engine = Engine::new();

    let created = engine
        .call(ALICE, create("ws1", TaskType::Build, "echo compiling; echo done"))
        .await;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["status"], "pending");
    let task_id = created["data"]["task_id"].as_str().unwrap().to_string();

    let task = engine.wait_for_task(ALICE, &task_id).await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["progress"], 100);
    assert_eq!(task["output"], serde_json::json!(["compiling", "done"]));
    assert!(task["started_at"].is_string());
    assert!(task["completed_at"].is_string());
    assert!(task["error"].is_null());

    let listed = engine
        .call(
            ALICE,
            Request::ListTasks {
                workspace_id: "ws1".to_string(),
                status: None,
                limit: None,
            },
        )
        .await;
    let tasks = listed["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["task_type"], "build");
}

#[tokio::test]
async fn test_failing_command_marks_task_failed() {
    let engine = Engine::new();
    let created = engine
        .call(ALICE, create("ws1", TaskType::Test, "echo running tests; exit 3"))
        .await;
    let task_id = created["data"]["task_id"].as_str().unwrap().to_string();

    let task = engine.wait_for_task(ALICE, &task_id).await;
    assert_eq!(task["status"], "failed");
    assert_eq!(task["error"], "exited with code 3");
    assert_eq!(task["output"][0], "running tests");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let engine = Engine::new();
    let ok = engine.call(ALICE, create("ws1", TaskType::Lint, "true")).await;
    let ok_id = ok["data"]["task_id"].as_str().unwrap().to_string();
    engine.wait_for_task(ALICE, &ok_id).await;

    let bad = engine.call(ALICE, create("ws1", TaskType::Lint, "false")).await;
    let bad_id = bad["data"]["task_id"].as_str().unwrap().to_string();
    engine.wait_for_task(ALICE, &bad_id).await;

    let failed = engine
        .call(
            ALICE,
            Request::ListTasks {
                workspace_id: "ws1".to_string(),
                status: Some(TaskStatus::Failed),
                limit: Some(10),
            },
        )
        .await;
    let tasks = failed["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], bad_id.as_str());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_running_task() {
    let engine = Engine::new();
    let created = engine
        .call(ALICE, create("ws1", TaskType::Custom, "echo begin; sleep 30"))
        .await;
    let task_id = created["data"]["task_id"].as_str().unwrap().to_string();

    // Let it start
    tokio::time::sleep(Duration::from_millis(300)).await;

    let cancelled = engine
        .call(
            ALICE,
            Request::CancelTask {
                task_id: task_id.clone(),
            },
        )
        .await;
    assert_eq!(cancelled["data"]["cancelled"], true);

    let task = engine.wait_for_task(ALICE, &task_id).await;
    assert_eq!(task["status"], "failed");
    assert_eq!(task["error"], "Command cancelled");

    let again = engine
        .call(ALICE, Request::CancelTask { task_id })
        .await;
    assert_eq!(again["data"]["cancelled"], false);
}

// ============================================================================
// Ownership and validation
// ============================================================================

#[tokio::test]
async fn test_foreign_task_is_not_found() {
    let engine = Engine::new();
    let created = engine.call(BOB, create("ws2", TaskType::Custom, "true")).await;
    let task_id = created["data"]["task_id"].as_str().unwrap().to_string();
    engine.wait_for_task(BOB, &task_id).await;

    let peek = engine
        .call(
            ALICE,
            Request::GetTask {
                task_id: task_id.clone(),
            },
        )
        .await;
    assert_error_kind(&peek, "not_found");

    let cancel = engine.call(ALICE, Request::CancelTask { task_id }).await;
    assert_error_kind(&cancel, "not_found");

    let create_there = engine.call(ALICE, create("ws2", TaskType::Custom, "true")).await;
    assert_error_kind(&create_there, "not_found");
}

#[tokio::test]
async fn test_empty_command_and_unknown_task() {
    let engine = Engine::new();
    let empty = engine.call(ALICE, create("ws1", TaskType::Custom, "  ")).await;
    assert_error_kind(&empty, "validation");

    let missing = engine
        .call(
            ALICE,
            Request::GetTask {
                task_id: "no-such-task".to_string(),
            },
        )
        .await;
    assert_error_kind(&missing, "not_found");
}
