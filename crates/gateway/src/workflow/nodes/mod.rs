//! Node implementations: one module per graph role, plus the shared
//! LLM streaming helper they all go through.

pub mod coordinator;
pub mod planner;
pub mod react;
pub mod supervisor;

use mf_domain::error::{Error, Result};
use mf_domain::llm::StreamEvent;
use mf_domain::message::{ChatMessage, ToolCall, ToolDefinition};
use mf_domain::Worker;
use mf_llm::{ChatRequest, LlmClient};
use mf_tools::CancelToken;

use futures_util::StreamExt;

use super::engine::EngineDeps;
use super::events::EventProjector;
use super::state::{NodeCommand, WorkflowState};

/// Dispatch a node by worker.
pub(crate) async fn run_node(
    worker: Worker,
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<NodeCommand> {
    match worker {
        Worker::Coordinator => coordinator::run(deps, state, projector, cancel).await,
        Worker::Planner => planner::run(deps, state, projector, cancel).await,
        Worker::Supervisor => supervisor::run(deps, state, projector, cancel).await,
        Worker::Researcher
        | Worker::Coder
        | Worker::Browser
        | Worker::Reporter
        | Worker::Translator => react::run(worker, deps, state, projector, cancel).await,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared LLM streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The outcome of one streamed LLM call.
pub(crate) struct LlmTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Stream one LLM call through the projector: `start_of_llm`, one
/// `message` delta per token group (content and reasoning kept apart),
/// `end_of_llm`. Checks cancellation at every delta.
pub(crate) async fn stream_llm_turn(
    client: &dyn LlmClient,
    worker: Worker,
    messages: Vec<ChatMessage>,
    tools: Vec<ToolDefinition>,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<LlmTurn> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    projector.start_llm(worker).await;

    let req = ChatRequest {
        messages,
        tools,
        temperature: Some(0.2),
        ..Default::default()
    };
    let mut stream = client.chat_stream(req).await?;

    let message_id = uuid::Uuid::new_v4().to_string();
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut failure: Option<Error> = None;

    while let Some(event) = stream.next().await {
        // Cancellation is the one thing allowed to cut the bracket off.
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };

        match event {
            StreamEvent::Token { text: chunk } => {
                projector
                    .message_delta(&message_id, Some(chunk.clone()), None)
                    .await;
                text.push_str(&chunk);
            }
            StreamEvent::Reasoning { text: chunk } => {
                projector.message_delta(&message_id, None, Some(chunk)).await;
            }
            StreamEvent::ToolCallFinished {
                call_id,
                tool_name,
                arguments,
            } => {
                tool_calls.push(ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                });
            }
            StreamEvent::ToolCallStarted { .. } | StreamEvent::ToolCallDelta { .. } => {
                // Assembly happens inside the adapter; only the
                // finished call matters here.
            }
            StreamEvent::Done { .. } => {}
            StreamEvent::Error { message } => {
                failure = Some(Error::Llm {
                    class: client.model_class().as_str().into(),
                    message,
                });
                break;
            }
        }
    }

    projector.end_llm(worker).await;

    match failure {
        Some(e) => Err(e),
        None => Ok(LlmTurn { text, tool_calls }),
    }
}
