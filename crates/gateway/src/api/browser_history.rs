//! `GET /api/browser_history/{filename}` — serve a browser-trace
//! artifact. Only bare `.gif` filenames are accepted; anything with a
//! path separator never reaches the filesystem.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::api_error;
use crate::state::AppState;

pub async fn browser_trace(
    State(app): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    if !is_safe_trace_name(&filename) {
        return api_error(
            StatusCode::BAD_REQUEST,
            "filename must be a bare .gif name",
        );
    }

    let path = app.config.browser.history_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/gif")],
            bytes,
        )
            .into_response(),
        Err(_) => api_error(
            StatusCode::NOT_FOUND,
            format!("no browser trace named {filename}"),
        ),
    }
}

fn is_safe_trace_name(filename: &str) -> bool {
    filename.ends_with(".gif")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && filename.len() > ".gif".len()
}
