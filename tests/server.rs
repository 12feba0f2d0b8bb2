//! HTTP tool server tests, driven through the router without a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use knowledge_harness::config::Config;
use knowledge_harness::index::build_index;
use knowledge_harness::progress::NoProgress;
use knowledge_harness::server::{build_router, AppState};
use knowledge_harness::snapshot::SnapshotHandle;
use knowledge_harness::traits::{ToolContext, ToolRegistry};
use knowledge_harness_core::CancelToken;

async fn setup() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("intro.md"),
        "# Introduction\n\nStart with the [guide](guide.md).\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("guide.md"),
        "# Guide\n\nBack to the [intro](intro.md).\n\n## See Also\n\n- [FAQ](faq.md)\n",
    )
    .unwrap();
    fs::write(tmp.path().join("faq.md"), "# FAQ\n\nQuestions.\n").unwrap();

    let config = Config::default();
    let outcome = build_index(tmp.path(), &config, &CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    let handle = Arc::new(SnapshotHandle::new(outcome.snapshot));
    let ctx = ToolContext::new(Arc::new(config), tmp.path().to_path_buf(), handle);
    let router = build_router(AppState::new(ToolRegistry::with_builtins(), ctx));
    (tmp, router)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_reports_snapshot() {
    let (_tmp, router) = setup().await;
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents"], 3);
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_tools_list() {
    let (_tmp, router) = setup().await;
    let (status, body) = get(&router, "/tools/list").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["resolve", "related", "traverse", "validate", "reindex"]);
    assert_eq!(body["tools"][0]["builtin"], true);
    assert_eq!(body["tools"][0]["parameters"]["required"][0], "query");
}

#[tokio::test]
async fn test_resolve_by_title() {
    let (_tmp, router) = setup().await;
    let (status, body) = post(&router, "/tools/resolve", json!({ "query": "Guide" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["id"], "guide");
    assert_eq!(body["result"]["in_cycle"], true);
    assert_eq!(body["result"]["links"][1]["related"], true);
}

#[tokio::test]
async fn test_resolve_unknown_is_404() {
    let (_tmp, router) = setup().await;
    let (status, body) = post(&router, "/tools/resolve", json!({ "query": "nothing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(
        body["error"]["message"],
        "resolve: document not found: nothing"
    );
}

#[tokio::test]
async fn test_bad_parameters_are_400() {
    let (_tmp, router) = setup().await;

    let (status, body) = post(&router, "/tools/related", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post(&router, "/tools/resolve", json!({ "query": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &router,
        "/tools/traverse",
        json!({ "id": "intro", "max_depth": "far" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_tool_is_404() {
    let (_tmp, router) = setup().await;
    let (status, body) = post(&router, "/tools/search", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no tool registered"));
}

#[tokio::test]
async fn test_related_and_traverse_tools() {
    let (_tmp, router) = setup().await;

    let (status, body) = post(&router, "/tools/related", json!({ "id": "guide" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["documents"][0]["id"], "faq");

    let (status, body) = post(&router, "/tools/traverse", json!({ "id": "intro" })).await;
    assert_eq!(status, StatusCode::OK);
    let walk: Vec<(&str, u64)> = body["result"]["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| (d["id"].as_str().unwrap(), d["depth"].as_u64().unwrap()))
        .collect();
    assert_eq!(walk, vec![("intro", 0), ("guide", 1)]);
}

#[tokio::test]
async fn test_validate_and_reindex() {
    let (tmp, router) = setup().await;

    let (status, body) = post(&router, "/tools/validate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["result"]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["cycle-detected"]);

    fs::write(tmp.path().join("new.md"), "# New\n").unwrap();
    let (status, body) = post(&router, "/tools/reindex", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["documents"], 4);

    let (_, health) = get(&router, "/health").await;
    assert_eq!(health["documents"], 4);
    assert_eq!(health["fingerprint"], body["result"]["fingerprint"]);
}
