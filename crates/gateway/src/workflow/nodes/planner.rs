//! Planner node: turns the request into a structured [`Plan`].
//!
//! Optionally pre-enriches its prompt with web-search results (search
//! failures are logged and never fatal), picks the model class by the
//! deep-thinking flag, streams, and requires the concatenated output to
//! parse as a plan — an unparseable plan terminates the run.

use chrono::Utc;

use mf_domain::error::{Error, Result};
use mf_domain::llm::ModelClass;
use mf_domain::message::{ChatMessage, Role};
use mf_domain::plan::Plan;
use mf_domain::Worker;
use mf_llm::extract_json;
use mf_tools::{CancelToken, ToolContext};

use super::super::engine::EngineDeps;
use super::super::events::EventProjector;
use super::super::prompts;
use super::super::state::{Goto, NodeCommand, StatePatch, WorkflowState};
use super::stream_llm_turn;

pub(crate) async fn run(
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<NodeCommand> {
    let mut messages = prompts::bind(Worker::Planner, state, Utc::now());

    if state.search_before_planning {
        if let Some(results) = pre_search(deps, state, projector, cancel).await {
            messages.push(ChatMessage::user(format!(
                "Background web search results for the request:\n\n{results}"
            )));
        }
    }

    let class = if state.deep_thinking {
        ModelClass::Reasoning
    } else {
        ModelClass::Basic
    };
    let client = deps.llm.select(class);

    let turn = stream_llm_turn(
        client.as_ref(),
        Worker::Planner,
        messages,
        Vec::new(),
        projector,
        cancel,
    )
    .await?;

    let candidate = extract_json(&turn.text);
    let plan: Plan = serde_json::from_str(candidate)
        .map_err(|e| Error::Workflow(format!("planner produced an invalid plan: {e}")))?;

    let plan_text = serde_json::to_string_pretty(&plan).map_err(Error::Json)?;

    Ok(NodeCommand {
        patch: StatePatch {
            messages: vec![ChatMessage::assistant(plan_text.clone())],
            full_plan: Some(plan_text),
            next: None,
        },
        goto: Goto::Worker(Worker::Supervisor),
    })
}

/// Best-effort search enrichment. Returns `None` on any failure.
async fn pre_search(
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Option<String> {
    let query = last_user_text(state)?;

    let ctx = ToolContext {
        tool_call_id: projector.next_tool_call_id(Worker::Planner, "web_search"),
        tool_name: "web_search".into(),
        cancel: cancel.clone(),
        progress: None,
    };

    match deps
        .tools
        .invoke("web_search", serde_json::json!({ "query": query }), &ctx)
        .await
    {
        Ok(results) => Some(results),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "search before planning failed, continuing with base prompt"
            );
            None
        }
    }
}

fn last_user_text(state: &WorkflowState) -> Option<String> {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.extract_all_text())
}
