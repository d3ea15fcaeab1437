//! The request orchestrator: one spawned task per turn.
//!
//! Emits `session_id` first, persists the user turn, drives the engine
//! with a timeout watchdog and a progress forwarder, and on a terminal
//! outcome persists assistant messages plus the state snapshot. A
//! cancelled run persists nothing beyond the user turn.

use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::Instrument;

use mf_domain::error::Error;
use mf_domain::event::WorkflowEvent;
use mf_domain::message::{ChatMessage, Role};
use mf_domain::Worker;
use mf_store::{MessageKind, MessageRole};
use mf_tools::CancelToken;

use crate::state::AppState;

use super::engine::{self, run_workflow, EngineDeps, RunOutcome};
use super::events::EventProjector;
use super::state::{message_to_json, WorkflowState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One validated turn, ready to run.
pub struct RunInput {
    pub session_id: String,
    pub roster: Vec<Worker>,
    pub deep_thinking: bool,
    pub search_before_planning: bool,
    /// The converted conversation seeding the workflow state.
    pub messages: Vec<ChatMessage>,
    /// The latest user turn, flattened for persistence.
    pub user_text: String,
    /// The client's raw `messages` payload (echoed in start_of_workflow).
    pub input_payload: serde_json::Value,
    pub debug: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start a run. The returned receiver yields the run's events; the
/// returned token cancels the run (the transport's disconnect guard
/// holds it). The permit (the session's run lock) is held until the
/// run task ends.
pub fn start_run(
    app: AppState,
    input: RunInput,
    permit: OwnedSemaphorePermit,
) -> (mpsc::Receiver<WorkflowEvent>, CancelToken) {
    let (tx, rx) = mpsc::channel(app.config.workflow.event_buffer);
    let cancel = CancelToken::new();

    let span = tracing::info_span!(
        "run",
        session_id = %input.session_id,
        debug = input.debug,
    );
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            run_inner(app, input, tx, cancel, permit).await;
        }
        .instrument(span)
    });

    (rx, cancel)
}

async fn run_inner(
    app: AppState,
    input: RunInput,
    tx: mpsc::Sender<WorkflowEvent>,
    cancel: CancelToken,
    _permit: OwnedSemaphorePermit,
) {
    let mut state = WorkflowState::new(
        input.roster.clone(),
        input.deep_thinking,
        input.search_before_planning,
        input.messages.clone(),
    );
    let projector = Arc::new(EventProjector::new(state.workflow_id.clone(), tx));

    // Session id goes out before any work so a reload can recover.
    projector
        .emit(WorkflowEvent::SessionId {
            session_id: input.session_id.clone(),
        })
        .await;

    // The user turn lands immediately: a later disconnect keeps it.
    if let Err(e) = app.store.append_message(
        &input.session_id,
        MessageRole::User,
        MessageKind::Text,
        &input.user_text,
    ) {
        tracing::error!(error = %e, "failed to persist user turn");
        projector
            .emit(WorkflowEvent::Error {
                detail: engine::sanitize(&e),
            })
            .await;
        return;
    }

    // Soft per-run timeout.
    let watchdog = {
        let cancel = cancel.clone();
        let timeout = std::time::Duration::from_secs(app.config.workflow.run_timeout_sec);
        let session_id = input.session_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(session_id = %session_id, reason = "timeout", "run timed out, cancelling");
            cancel.cancel();
        })
    };

    // Tool progress callbacks → projector, concurrently with the engine.
    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let forwarder = {
        let projector = projector.clone();
        tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                projector.tool_progress(progress).await;
            }
        })
    };

    let deps = EngineDeps {
        llm: app.llm.clone(),
        tools: app.tools.clone(),
        config: app.config.workflow.clone(),
        progress: progress_tx,
    };

    let seed_len = state.messages.len();
    let outcome = run_workflow(&deps, &mut state, &projector, &cancel, &input.input_payload).await;

    // Teardown in reverse order of setup.
    watchdog.abort();
    drop(deps);
    let _ = forwarder.await;

    match outcome {
        Ok(RunOutcome::Completed) => {
            finalize(&app, &input, &state, seed_len, &projector, None).await;
        }
        Ok(RunOutcome::Failed { detail }) => {
            finalize(&app, &input, &state, seed_len, &projector, Some(detail)).await;
        }
        Err(Error::Cancelled) => {
            // No terminal event was emitted: persist nothing partial and
            // make sure any browser session is released.
            app.browser_pool.abort_all();
            tracing::info!("run cancelled; session state left untouched");
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed outside the engine");
            projector
                .emit(WorkflowEvent::Error {
                    detail: engine::sanitize(&e),
                })
                .await;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Terminal persistence + events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persist the run's produced messages (the accepted plan as a
/// `workflow`-kind envelope, everything else as text), then emit the
/// terminal events. `failure` switches the success shape
/// (`end_of_workflow` + snapshot) for an `error` event.
async fn finalize(
    app: &AppState,
    input: &RunInput,
    state: &WorkflowState,
    seed_len: usize,
    projector: &EventProjector,
    failure: Option<String>,
) {
    for msg in &state.messages[seed_len..] {
        if msg.role != Role::Assistant {
            continue;
        }
        let text = msg.content.extract_all_text();

        let (kind, content) = if state.full_plan.as_deref() == Some(text.as_str()) {
            let plan: serde_json::Value =
                serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text.clone()));
            (
                MessageKind::Workflow,
                serde_json::json!({ "workflow": plan }).to_string(),
            )
        } else {
            (MessageKind::Text, text)
        };

        if let Err(e) =
            app.store
                .append_message(&input.session_id, MessageRole::Assistant, kind, &content)
        {
            tracing::warn!(error = %e, "failed to persist assistant message");
        }
    }

    match failure {
        None => {
            if let Err(e) = app.store.update_state(&input.session_id, &state.snapshot()) {
                tracing::warn!(error = %e, "failed to persist state snapshot");
            }

            projector
                .emit(WorkflowEvent::EndOfWorkflow {
                    workflow_id: state.workflow_id.clone(),
                    messages: state.messages.iter().map(message_to_json).collect(),
                })
                .await;
        }
        Some(detail) => {
            projector.emit(WorkflowEvent::Error { detail }).await;
        }
    }

    // Rehydration snapshot: the session log as the client will re-fetch it.
    match app.store.list_messages(&input.session_id) {
        Ok(messages) => {
            let messages = messages
                .iter()
                .map(|m| serde_json::to_value(m).unwrap_or_default())
                .collect();
            projector
                .emit(WorkflowEvent::FinalSessionState { messages })
                .await;
        }
        Err(e) => tracing::warn!(error = %e, "failed to load session log for final state"),
    }
}
