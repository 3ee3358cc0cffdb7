//! Codebase Index Integration Tests
//!
//! Builds real indexes over temporary workspaces:
//! - files, symbols and manifest dependencies are counted
//! - vendored directories are skipped
//! - rebuilds are idempotent
//! - status and symbol queries read the stored snapshot

use serde_json::json;

use workspace_engine::Request;

use super::support::{assert_error_kind, write, Engine, ALICE};

fn seed(engine: &Engine) {
    write(
        &engine.ws1,
        "src/app.ts",
        "export function parseConfig(input: string) {\n  return input;\n}\n\nexport class ConfigLoader {}\n",
    );
    write(&engine.ws1, "src/util.py", "def helper():\n    pass\n");
    write(
        &engine.ws1,
        "node_modules/pkg/index.js",
        "function ignored() {}\n",
    );
    write(
        &engine.ws1,
        "package.json",
        r#"{ "dependencies": { "express": "^4.18.0" }, "devDependencies": { "jest": "^29.0.0" } }"#,
    );
}

fn build(path: &str, include_embeddings: bool) -> Request {
    Request::BuildIndex {
        workspace_id: "ws1".to_string(),
        path: path.to_string(),
        include_embeddings,
    }
}

// ============================================================================
// Build
// ============================================================================

#[tokio::test]
async fn test_build_index_counts() {
    let engine = Engine::new();
    seed(&engine);

    let response = engine.call(ALICE, build(".", false)).await;
    assert_eq!(response["success"], true, "{}", response);
    assert_eq!(
        response["data"],
        json!({ "files": 2, "symbols": 3, "dependencies": 2, "embeddings_generated": 0 })
    );
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let engine = Engine::new();
    seed(&engine);

    let first = engine.call(ALICE, build(".", true)).await;
    let second = engine.call(ALICE, build(".", true)).await;
    assert_eq!(first["data"], second["data"]);
    assert_eq!(second["data"]["embeddings_generated"], 2);

    let status = engine
        .call(
            ALICE,
            Request::IndexStatus {
                workspace_id: "ws1".to_string(),
            },
        )
        .await;
    assert_eq!(status["data"]["stats"]["files"], 2);
    assert_eq!(status["data"]["stats"]["embedding_chunks"], 2);
}

#[tokio::test]
async fn test_build_subdirectory() {
    let engine = Engine::new();
    seed(&engine);

    let response = engine.call(ALICE, build("src", false)).await;
    assert_eq!(response["data"]["files"], 2);
    assert_eq!(response["data"]["dependencies"], 0);
}

#[tokio::test]
async fn test_build_outside_workspace_is_rejected() {
    let engine = Engine::new();
    let escape = engine.call(ALICE, build("../..", false)).await;
    assert_error_kind(&escape, "path_violation");

    let missing = engine.call(ALICE, build("does/not/exist", false)).await;
    assert_error_kind(&missing, "not_found");
}

// ============================================================================
// Status and symbols
// ============================================================================

#[tokio::test]
async fn test_index_status_before_and_after() {
    let engine = Engine::new();
    seed(&engine);

    let before = engine
        .call(
            ALICE,
            Request::IndexStatus {
                workspace_id: "ws1".to_string(),
            },
        )
        .await;
    assert_eq!(before["data"], json!({ "indexed": false }));

    engine.call(ALICE, build(".", false)).await;

    let after = engine
        .call(
            ALICE,
            Request::IndexStatus {
                workspace_id: "ws1".to_string(),
            },
        )
        .await;
    assert_eq!(after["data"]["indexed"], true);
    assert!(after["data"]["last_indexed_at"].is_string());
    assert_eq!(after["data"]["stats"]["symbols"], 3);
    assert_eq!(after["data"]["stats"]["dependencies"], 2);
    assert_eq!(after["data"]["stats"]["languages"]["typescript"], 1);
    assert_eq!(after["data"]["stats"]["languages"]["python"], 1);
}

#[tokio::test]
async fn test_query_symbols() {
    let engine = Engine::new();
    seed(&engine);
    engine.call(ALICE, build(".", false)).await;

    let response = engine
        .call(
            ALICE,
            Request::QuerySymbols {
                workspace_id: "ws1".to_string(),
                pattern: "config".to_string(),
                limit: None,
            },
        )
        .await;
    let symbols = response["data"].as_array().unwrap();
    let names: Vec<&str> = symbols.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ConfigLoader", "parseConfig"]);
    assert_eq!(symbols[1]["kind"], "function");
    assert_eq!(symbols[1]["file"], "src/app.ts");
    assert_eq!(symbols[1]["line"], 1);

    let empty = engine
        .call(
            ALICE,
            Request::QuerySymbols {
                workspace_id: "ws1".to_string(),
                pattern: String::new(),
                limit: None,
            },
        )
        .await;
    assert_error_kind(&empty, "validation");
}
