//! File Change Feed Integration Tests
//!
//! Changes made through the engine and changes made behind its back both
//! show up in the feed, in order, behind a caller-held watermark.

use workspace_engine::Request;

use super::support::{assert_error_kind, Engine, ALICE};

fn poll(since: i64) -> Request {
    Request::PollChanges {
        workspace_id: "ws1".to_string(),
        since,
    }
}

fn summary(response: &serde_json::Value) -> Vec<(String, String)> {
    response["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["path"].as_str().unwrap().to_string(),
                e["type"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_create_then_delete_is_reported_in_order() {
    let engine = Engine::new();
    engine
        .call(
            ALICE,
            Request::WriteFile {
                workspace_id: "ws1".to_string(),
                path: "src/a.ts".to_string(),
                content: "let a = 1;".to_string(),
            },
        )
        .await;
    engine
        .call(
            ALICE,
            Request::DeleteFile {
                workspace_id: "ws1".to_string(),
                path: "src/a.ts".to_string(),
            },
        )
        .await;

    let response = engine.call(ALICE, poll(0)).await;
    assert_eq!(
        summary(&response),
        vec![
            ("src/a.ts".to_string(), "created".to_string()),
            ("src/a.ts".to_string(), "deleted".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_watermark_and_external_changes() {
    let engine = Engine::new();
    std::fs::write(engine.ws1.join("before.txt"), "old").unwrap();

    // First poll records the baseline only
    let baseline = engine.call(ALICE, poll(0)).await;
    assert_eq!(baseline["data"], serde_json::json!([]));

    engine
        .call(
            ALICE,
            Request::WriteFile {
                workspace_id: "ws1".to_string(),
                path: "tracked.txt".to_string(),
                content: "v1".to_string(),
            },
        )
        .await;
    let first = engine.call(ALICE, poll(0)).await;
    assert_eq!(
        summary(&first),
        vec![("tracked.txt".to_string(), "created".to_string())]
    );
    let watermark = first["data"][0]["timestamp"].as_i64().unwrap();

    std::fs::write(engine.ws1.join("outside.txt"), "made by an editor").unwrap();
    let next = engine.call(ALICE, poll(watermark)).await;
    assert_eq!(
        summary(&next),
        vec![("outside.txt".to_string(), "created".to_string())]
    );
    assert!(next["data"][0]["timestamp"].as_i64().unwrap() > watermark);
}

#[tokio::test]
async fn test_foreign_owner_cannot_poll() {
    let engine = Engine::new();
    let response = engine.call("mallory", poll(0)).await;
    assert_error_kind(&response, "not_found");
}

#[tokio::test]
async fn test_repeated_writes_keep_chronological_order() {
    let engine = Engine::new();
    let baseline = engine.call(ALICE, poll(0)).await;
    assert_eq!(baseline["data"], serde_json::json!([]));

    for content in ["1", "22"] {
        engine
            .call(
                ALICE,
                Request::WriteFile {
                    workspace_id: "ws1".to_string(),
                    path: "src/a.ts".to_string(),
                    content: content.to_string(),
                },
            )
            .await;
    }

    let response = engine.call(ALICE, poll(0)).await;
    assert_eq!(
        summary(&response),
        vec![
            ("src/a.ts".to_string(), "created".to_string()),
            ("src/a.ts".to_string(), "modified".to_string()),
        ]
    );
}
