//! Semantic Search Integration Tests
//!
//! Uses the offline hashing provider so rankings are deterministic and no
//! network access is needed.

use workspace_engine::Request;

use super::support::{assert_error_kind, write, Engine, ALICE, BOB};

fn search(workspace_id: &str, query: &str, limit: Option<usize>) -> Request {
    Request::Search {
        workspace_id: workspace_id.to_string(),
        query: query.to_string(),
        limit,
    }
}

async fn index_with_embeddings(engine: &Engine, owner: &str, workspace_id: &str) {
    let response = engine
        .call(
            owner,
            Request::BuildIndex {
                workspace_id: workspace_id.to_string(),
                path: ".".to_string(),
                include_embeddings: true,
            },
        )
        .await;
    assert_eq!(response["success"], true, "{}", response);
}

// ============================================================================
// Ranking
// ============================================================================

#[tokio::test]
async fn test_search_ranks_matching_file_first() {
    let engine = Engine::new();
    write(
        &engine.ws1,
        "src/config.ts",
        "export function parseConfig(raw: string) {\n  return JSON.parse(raw);\n}\n",
    );
    write(
        &engine.ws1,
        "src/math.ts",
        "export function addNumbers(a: number, b: number) {\n  return a + b;\n}\n",
    );
    index_with_embeddings(&engine, ALICE, "ws1").await;

    let response = engine.call(ALICE, search("ws1", "parse config", None)).await;
    let results = response["data"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["path"], "src/config.ts");
    assert!(results[0]["similarity"].as_f64().unwrap() > results[1]["similarity"].as_f64().unwrap());
    assert!(results[0]["content"].as_str().unwrap().contains("parseConfig"));

    let limited = engine.call(ALICE, search("ws1", "parse config", Some(1))).await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_search_never_crosses_workspaces() {
    let engine = Engine::new();
    write(&engine.ws1, "src/alpha.ts", "export const alphaValue = 1;\n");
    write(
        &engine.ws2,
        "src/alpha_secret.ts",
        "export const alphaValue = 2;\nexport const alphaSecret = 3;\n",
    );
    index_with_embeddings(&engine, ALICE, "ws1").await;
    index_with_embeddings(&engine, BOB, "ws2").await;

    let response = engine.call(ALICE, search("ws1", "alpha secret value", Some(10))).await;
    let results = response["data"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results.iter().all(|r| r["path"] == "src/alpha.ts"));

    let foreign = engine.call(ALICE, search("ws2", "alpha", None)).await;
    assert_error_kind(&foreign, "not_found");
}

// ============================================================================
// Edge cases
// ============================================================================

#[tokio::test]
async fn test_search_without_embeddings_is_empty() {
    let engine = Engine::new();
    let response = engine.call(ALICE, search("ws1", "anything", None)).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let engine = Engine::new();
    let response = engine.call(ALICE, search("ws1", "  ", None)).await;
    assert_error_kind(&response, "validation");
}
