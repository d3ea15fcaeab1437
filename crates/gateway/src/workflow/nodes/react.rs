//! Generic react-style worker: (LLM call → tool calls → observations)
//! until the model answers without tools or the loop bound is hit.
//!
//! Drives researcher, coder, browser, reporter, and translator — the
//! last two simply never receive tools, so their loop is a single call.

use chrono::Utc;

use mf_domain::error::{Error, Result};
use mf_domain::event::WorkflowEvent;
use mf_domain::message::{ChatMessage, ContentPart, MessageContent, Role, ToolCall};
use mf_domain::Worker;
use mf_llm::LlmRouter;
use mf_tools::{toolset, CancelToken, ToolContext};

use super::super::engine::EngineDeps;
use super::super::events::EventProjector;
use super::super::prompts;
use super::super::state::{Goto, NodeCommand, StatePatch, WorkflowState};
use super::stream_llm_turn;

pub(crate) async fn run(
    worker: Worker,
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<NodeCommand> {
    let tool_defs = deps.tools.definitions_for(toolset(worker));
    let class = LlmRouter::class_for(worker, state.deep_thinking);
    let client = deps.llm.select(class);

    let mut conversation = prompts::bind(worker, state, Utc::now());
    let mut final_text = String::new();

    for loop_idx in 0..deps.config.max_react_loops {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let turn = stream_llm_turn(
            client.as_ref(),
            worker,
            conversation.clone(),
            tool_defs.clone(),
            projector,
            cancel,
        )
        .await?;

        if turn.tool_calls.is_empty() {
            final_text = turn.text;
            break;
        }

        tracing::debug!(
            worker = %worker,
            loop_idx,
            calls = turn.tool_calls.len(),
            "dispatching tool calls"
        );

        conversation.push(assistant_tool_message(&turn.text, &turn.tool_calls));

        for tc in &turn.tool_calls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let tool_call_id = projector.next_tool_call_id(worker, &tc.tool_name);
            projector
                .emit(WorkflowEvent::ToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tc.tool_name.clone(),
                    tool_input: tc.arguments.clone(),
                })
                .await;

            let ctx = ToolContext {
                tool_call_id: tool_call_id.clone(),
                tool_name: tc.tool_name.clone(),
                cancel: cancel.clone(),
                progress: Some(deps.progress.clone()),
            };
            let result = deps.tools.invoke(&tc.tool_name, tc.arguments.clone(), &ctx).await;

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Failures become observations the model can react to.
            let content = match result {
                Ok(output) => output,
                Err(e) => format!("tool {} failed: {e}", tc.tool_name),
            };

            projector
                .emit(WorkflowEvent::ToolCallResult {
                    tool_call_id,
                    tool_name: tc.tool_name.clone(),
                    tool_result: content.clone(),
                })
                .await;

            // Conversation wiring uses the model's own call id.
            conversation.push(ChatMessage::tool_result(&tc.call_id, &content));
        }

        if loop_idx + 1 == deps.config.max_react_loops {
            tracing::warn!(worker = %worker, "react loop limit reached");
            final_text = format!(
                "Stopped after {} tool iterations without a final answer.",
                deps.config.max_react_loops
            );
        }
    }

    let message = if worker == Worker::Reporter {
        // The reporter's text is the user-facing answer, verbatim.
        ChatMessage::assistant(final_text)
    } else {
        ChatMessage::assistant(format!("Response from {}:\n\n{final_text}", worker.as_str()))
    };

    let goto = match worker {
        Worker::Reporter => Goto::End,
        // Translator runs pre-planning on the coordinator path.
        Worker::Translator if state.full_plan.is_none() => Goto::Worker(Worker::Planner),
        _ => Goto::Worker(Worker::Supervisor),
    };

    Ok(NodeCommand {
        patch: StatePatch {
            messages: vec![message],
            ..Default::default()
        },
        goto,
    })
}

/// The assistant message carrying this turn's text and tool uses, in
/// the shape the next LLM call expects.
fn assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> ChatMessage {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
    for tc in tool_calls {
        parts.push(ContentPart::ToolUse {
            id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            input: tc.arguments.clone(),
        });
    }
    ChatMessage {
        role: Role::Assistant,
        content: MessageContent::Parts(parts),
    }
}
