//! Sandbox Integration Tests
//!
//! Synchronous command runs and file access through `dispatch`:
//! - exit codes are reported as data
//! - timeouts return promptly with partial output and stop every process
//!   the command started
//! - paths cannot escape the workspace
//! - another owner's workspace looks missing

use std::time::{Duration, Instant};

use workspace_engine::models::command::PresetKind;
use workspace_engine::Request;

use super::support::{assert_error_kind, Engine, ALICE, BOB};

// ============================================================================
// Command execution
// ============================================================================

#[tokio::test]
async fn test_execute_command_runs_in_workspace_root() {
    let engine = Engine::new();
    std::fs::write(engine.ws1.join("marker.txt"), "here").unwrap();

    let response = engine
        .call(
            ALICE,
            Request::ExecuteCommand {
                workspace_id: "ws1".to_string(),
                command: "cat marker.txt".to_string(),
                timeout_ms: None,
            },
        )
        .await;

    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["success"], true);
    assert_eq!(response["data"]["output"], "here");
    assert!(response["data"]["error"].is_null());
}

#[tokio::test]
async fn test_nonzero_exit_is_reported_as_data() {
    let engine = Engine::new();
    let response = engine
        .call(
            ALICE,
            Request::ExecuteCommand {
                workspace_id: "ws1".to_string(),
                command: "echo partial; echo broken >&2; exit 4".to_string(),
                timeout_ms: None,
            },
        )
        .await;

    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["success"], false);
    assert_eq!(response["data"]["output"], "partial\n");
    assert_eq!(response["data"]["error"], "broken\n");
}

#[tokio::test]
async fn test_timeout_returns_partial_output() {
    let engine = Engine::new();
    let started = Instant::now();
    let response = engine
        .call(
            ALICE,
            Request::ExecuteCommand {
                workspace_id: "ws1".to_string(),
                command: "echo started; sleep 10".to_string(),
                timeout_ms: Some(300),
            },
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_error_kind(&response, "timeout");
    assert_eq!(response["data"]["output"], "started\n");
    assert_eq!(response["data"]["success"], false);
}

#[tokio::test]
async fn test_timeout_stops_nested_processes() {
    let engine = Engine::new();
    let response = engine
        .call(
            ALICE,
            Request::ExecuteCommand {
                workspace_id: "ws1".to_string(),
                command: "echo start; sh -c 'sleep 1; touch survived.txt'; echo done".to_string(),
                timeout_ms: Some(200),
            },
        )
        .await;
    assert_error_kind(&response, "timeout");
    assert_eq!(response["data"]["output"], "start\n");

    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(!engine.ws1.join("survived.txt").exists());
}

#[tokio::test]
async fn test_empty_command_is_rejected() {
    let engine = Engine::new();
    let response = engine
        .call(
            ALICE,
            Request::ExecuteCommand {
                workspace_id: "ws1".to_string(),
                command: "   ".to_string(),
                timeout_ms: None,
            },
        )
        .await;
    assert_error_kind(&response, "validation");
}

// ============================================================================
// File access
// ============================================================================

#[tokio::test]
async fn test_write_then_read_file() {
    let engine = Engine::new();
    let write = engine
        .call(
            ALICE,
            Request::WriteFile {
                workspace_id: "ws1".to_string(),
                path: "src/nested/app.ts".to_string(),
                content: "export const answer = 42;\n".to_string(),
            },
        )
        .await;
    assert_eq!(write["success"], true);
    assert!(engine.ws1.join("src/nested/app.ts").exists());

    let read = engine
        .call(
            ALICE,
            Request::ReadFile {
                workspace_id: "ws1".to_string(),
                path: "src/nested/app.ts".to_string(),
            },
        )
        .await;
    assert_eq!(read["data"], "export const answer = 42;\n");
}

#[tokio::test]
async fn test_parent_escape_is_a_path_violation() {
    let engine = Engine::new();

    let read = engine
        .call(
            ALICE,
            Request::ReadFile {
                workspace_id: "ws1".to_string(),
                path: "../../etc/passwd".to_string(),
            },
        )
        .await;
    assert_error_kind(&read, "path_violation");

    let write = engine
        .call(
            ALICE,
            Request::WriteFile {
                workspace_id: "ws1".to_string(),
                path: "../../etc/passwd".to_string(),
                content: "x".to_string(),
            },
        )
        .await;
    assert_error_kind(&write, "path_violation");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let engine = Engine::new();
    let response = engine
        .call(
            ALICE,
            Request::ReadFile {
                workspace_id: "ws1".to_string(),
                path: "nope.txt".to_string(),
            },
        )
        .await;
    assert_error_kind(&response, "not_found");
}

// ============================================================================
// Ownership
// ============================================================================

#[tokio::test]
async fn test_foreign_workspace_is_not_found() {
    let engine = Engine::new();
    std::fs::write(engine.ws2.join("secret.txt"), "bob's").unwrap();

    let read = engine
        .call(
            ALICE,
            Request::ReadFile {
                workspace_id: "ws2".to_string(),
                path: "secret.txt".to_string(),
            },
        )
        .await;
    assert_error_kind(&read, "not_found");

    let preset = engine
        .call(
            ALICE,
            Request::RunPreset {
                workspace_id: "ws2".to_string(),
                preset: PresetKind::Build,
            },
        )
        .await;
    assert_error_kind(&preset, "not_found");

    let own = engine
        .call(
            BOB,
            Request::ReadFile {
                workspace_id: "ws2".to_string(),
                path: "secret.txt".to_string(),
            },
        )
        .await;
    assert_eq!(own["data"], "bob's");
}
