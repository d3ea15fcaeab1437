//! `POST /api/chat/stream` — start a turn and stream workflow events.
//!
//! Framing is SSE: `event: <type>` + one compact-JSON `data:` line per
//! event. Comment keep-alives cover idle stretches; when the client
//! disconnects, axum drops the response stream, the guard inside it
//! cancels the run, and the engine unwinds at its next check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_core::Stream;
use serde::Deserialize;

use mf_domain::agents::{default_roster, validate_roster};
use mf_domain::error::Error;
use mf_domain::event::WorkflowEvent;
use mf_domain::message::{ChatMessage, ContentPart, MessageContent, Role};
use mf_domain::Worker;
use mf_tools::CancelToken;

use crate::api::api_error;
use crate::state::AppState;
use crate::workflow::{start_run, RunInput};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub deep_thinking_mode: bool,
    #[serde(default)]
    pub search_before_planning: bool,
    /// Dispatchable team for this run. Absent = default roster.
    #[serde(default)]
    pub team_members: Option<Vec<String>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: IncomingContent,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum IncomingContent {
    Text(String),
    Parts(Vec<IncomingPart>),
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(tag = "type")]
pub enum IncomingPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { image_url: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(app): State<AppState>,
    Json(body): Json<ChatStreamRequest>,
) -> impl IntoResponse {
    // ── Validation (HTTP 4xx, before any streaming) ────────────────
    let input = match validate_request(&app, &body) {
        Ok(input) => input,
        Err(resp) => return resp,
    };

    // ── One active run per session ─────────────────────────────────
    let permit = match app.session_locks.try_acquire(&input.session_id) {
        Ok(p) => p,
        Err(busy) => {
            return api_error(StatusCode::CONFLICT, busy.to_string());
        }
    };

    let (rx, cancel) = start_run(app, input, permit);

    Sse::new(event_stream(rx, cancel))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Cancels the run when the SSE stream is dropped (client disconnect
/// or stalled write abort). Disarmed once the run's channel closes on
/// its own.
struct DisconnectGuard {
    cancel: CancelToken,
    armed: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!("client disconnected, cancelling run");
            self.cancel.cancel();
        }
    }
}

fn event_stream(
    mut rx: tokio::sync::mpsc::Receiver<WorkflowEvent>,
    cancel: CancelToken,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        let mut guard = DisconnectGuard {
            cancel,
            armed: true,
        };

        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.event_type()).data(data));
        }

        // Channel closed: the run ended by itself, nothing to cancel.
        guard.armed = false;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn validate_request(
    app: &AppState,
    body: &ChatStreamRequest,
) -> Result<RunInput, axum::response::Response> {
    if body.messages.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "messages must not be empty"));
    }

    let messages = convert_messages(&body.messages)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let last = messages.last().expect("checked non-empty");
    if last.role != Role::User {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "the last message must be a user turn",
        ));
    }
    let user_text = last.content.extract_all_text();
    if user_text.trim().is_empty() && !last.content.has_image() {
        return Err(api_error(StatusCode::BAD_REQUEST, "the user turn is empty"));
    }

    let roster: Vec<Worker> = match &body.team_members {
        Some(names) => validate_roster(names)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => default_roster(),
    };

    // Resolve or create the session.
    let session_id = match &body.session_id {
        Some(id) => match app.store.get_session(id) {
            Ok(Some(session)) => session.id,
            Ok(None) => {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    format!("session not found: {id}"),
                ))
            }
            Err(e) => {
                return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        },
        None => match app.store.create_session(None) {
            Ok(session) => session.id,
            Err(e) => {
                return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        },
    };

    Ok(RunInput {
        session_id,
        roster,
        deep_thinking: body.deep_thinking_mode,
        search_before_planning: body.search_before_planning,
        messages,
        user_text,
        input_payload: serde_json::to_value(&body.messages)
            .unwrap_or(serde_json::Value::Null),
        debug: body.debug,
    })
}

/// Convert wire messages to the internal chat shape.
fn convert_messages(incoming: &[IncomingMessage]) -> Result<Vec<ChatMessage>, Error> {
    incoming
        .iter()
        .map(|m| {
            let role = match m.role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                other => {
                    return Err(Error::Other(format!("unsupported message role: {other}")))
                }
            };
            let content = match &m.content {
                IncomingContent::Text(t) => MessageContent::Text(t.clone()),
                IncomingContent::Parts(parts) => MessageContent::Parts(
                    parts
                        .iter()
                        .map(|p| match p {
                            IncomingPart::Text { text } => ContentPart::Text {
                                text: text.clone(),
                            },
                            IncomingPart::Image { image_url } => ContentPart::Image {
                                image_url: image_url.clone(),
                                media_type: None,
                            },
                        })
                        .collect(),
                ),
            };
            Ok(ChatMessage { role, content })
        })
        .collect()
}
