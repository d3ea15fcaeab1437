//! Session endpoints: explicit create, history fetch, delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::api_error;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /api/session` — create a session explicitly.
pub async fn create_session(
    State(app): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Response {
    let user_id = body.and_then(|Json(b)| b.user_id);

    match app.store.create_session(user_id.as_deref()) {
        Ok(session) => (StatusCode::OK, Json(serde_json::json!(session))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /api/session/{id}/history` — messages + last state snapshot.
pub async fn session_history(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match app.store.format_history(&id) {
        Ok(history) => Json(history).into_response(),
        Err(mf_domain::Error::SessionNotFound(_)) => {
            api_error(StatusCode::NOT_FOUND, format!("session not found: {id}"))
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `DELETE /api/session/{id}` — delete a session (messages cascade).
pub async fn delete_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match app.store.delete_session(&id) {
        Ok(true) => Json(serde_json::json!({ "deleted": id })).into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, format!("session not found: {id}")),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
