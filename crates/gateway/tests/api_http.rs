//! HTTP surface tests: request validation, session CRUD, the registry
//! listing, and browser-trace serving — everything that terminates
//! before an LLM call.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use mf_domain::config::Config;
use mf_domain::error::Result;
use mf_domain::llm::{BoxStream, ModelClass, StreamEvent};
use mf_gateway::state::AppState;
use mf_gateway::workflow::session_lock::SessionLockMap;
use mf_llm::{ChatRequest, ChatResponse, LlmClient, LlmRouter};
use mf_store::SessionStore;
use mf_tools::browser::BrowserPool;
use mf_tools::ToolRegistry;

/// These tests must never reach the model.
struct UnreachableLlm;

#[async_trait]
impl LlmClient for UnreachableLlm {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        panic!("validation should fail before any LLM call")
    }
    async fn chat_stream(
        &self,
        _req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        panic!("validation should fail before any LLM call")
    }
    fn model_class(&self) -> ModelClass {
        ModelClass::Basic
    }
}

fn test_app(history_dir: Option<std::path::PathBuf>) -> (axum::Router, AppState) {
    let mut config = Config::default();
    config.storage.database_url = ":memory:".into();
    if let Some(dir) = history_dir {
        config.browser.history_dir = dir;
    }
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        store: Arc::new(SessionStore::in_memory().unwrap()),
        llm: LlmRouter::new(Arc::new(UnreachableLlm), None, None),
        tools: Arc::new(ToolRegistry::new(config.tools.retry.clone())),
        browser_pool: Arc::new(BrowserPool::new(config.browser.clone())),
        session_locks: Arc::new(SessionLockMap::new()),
    };
    let router = mf_gateway::api::router().with_state(state.clone());
    (router, state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_answers_ok() {
    let (app, _) = test_app(None);
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_messages_is_a_400() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(post_json(
            "/api/chat/stream",
            serde_json::json!({"messages": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn empty_team_members_is_a_400() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(post_json(
            "/api/chat/stream",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "team_members": [],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn roster_missing_reporter_is_a_400() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(post_json(
            "/api/chat/stream",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "team_members": ["researcher", "coder"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("reporter"));
}

#[tokio::test]
async fn unknown_worker_in_roster_is_a_400() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(post_json(
            "/api/chat/stream",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "team_members": ["surgeon", "reporter"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_a_404() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(post_json(
            "/api/chat/stream",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "session_id": "00000000-0000-0000-0000-000000000000",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_create_history_delete_round_trip() {
    let (app, state) = test_app(None);

    // Create.
    let response = app
        .clone()
        .oneshot(post_json("/api/session", serde_json::json!({"user_id": "u1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 36);

    // Seed a message directly and fetch history.
    state
        .store
        .append_message(&id, mf_store::MessageRole::User, mf_store::MessageKind::Text, "hi")
        .unwrap();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/session/{id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    assert_eq!(history["session_id"], serde_json::json!(id));
    assert_eq!(history["messages"].as_array().unwrap().len(), 1);

    // Delete; history now 404s.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/session/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/session/{id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_of_unknown_session_is_a_404() {
    let (app, _) = test_app(None);
    let response = app
        .oneshot(get("/api/session/does-not-exist/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_members_lists_the_registry() {
    let (app, _) = test_app(None);
    let response = app.oneshot(get("/api/team_members")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let members = body["team_members"].as_array().unwrap();
    assert_eq!(members.len(), 8);
    assert!(members.iter().any(|m| m["name"] == "coordinator"));
}

#[tokio::test]
async fn browser_trace_serving_and_guards() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("wf1_browser_browser_0.gif"), b"GIF89a...").unwrap();
    let (app, _) = test_app(Some(dir.path().to_path_buf()));

    // Served with the gif content type.
    let response = app
        .clone()
        .oneshot(get("/api/browser_history/wf1_browser_browser_0.gif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/gif"
    );

    // Non-gif names are rejected outright.
    let response = app
        .clone()
        .oneshot(get("/api/browser_history/trace.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing artifacts 404.
    let response = app
        .oneshot(get("/api/browser_history/missing.gif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
