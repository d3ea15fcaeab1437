pub mod browser_history;
pub mod chat;
pub mod session;
pub mod team;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "detail": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "detail": message.into() })),
    )
        .into_response()
}

/// `GET /api/health` — liveness probe.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat/stream", post(chat::chat_stream))
        .route("/api/session", post(session::create_session))
        .route("/api/session/:id/history", get(session::session_history))
        .route("/api/session/:id", delete(session::delete_session))
        .route("/api/team_members", get(team::team_members))
        .route(
            "/api/browser_history/:filename",
            get(browser_history::browser_trace),
        )
}
