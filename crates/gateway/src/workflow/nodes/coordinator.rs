//! Coordinator node: the graph's entry point.
//!
//! Streams one basic-class LLM call. A `handoff_to_planner` marker
//! advances into the planning pipeline; a `handoff_to_translator`
//! marker routes through the translator first (when rostered);
//! otherwise the streamed reply is the whole run.

use chrono::Utc;

use mf_domain::error::Result;
use mf_domain::llm::ModelClass;
use mf_domain::message::ChatMessage;
use mf_domain::Worker;
use mf_tools::CancelToken;

use super::super::engine::EngineDeps;
use super::super::events::EventProjector;
use super::super::prompts;
use super::super::state::{Goto, NodeCommand, StatePatch, WorkflowState};
use super::stream_llm_turn;

const PLANNER_MARKER: &str = "handoff_to_planner";
const TRANSLATOR_MARKER: &str = "handoff_to_translator";

pub(crate) async fn run(
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<NodeCommand> {
    let messages = prompts::bind(Worker::Coordinator, state, Utc::now());
    let client = deps.llm.select(ModelClass::Basic);

    let turn = stream_llm_turn(
        client.as_ref(),
        Worker::Coordinator,
        messages,
        Vec::new(),
        projector,
        cancel,
    )
    .await?;

    if turn.text.contains(TRANSLATOR_MARKER) {
        if state.roster_contains(Worker::Translator) {
            return Ok(NodeCommand::goto(Goto::Worker(Worker::Translator)));
        }
        // No translator rostered: the coordinator still judged this a
        // real task, so plan it as-is.
        return Ok(NodeCommand::goto(Goto::Worker(Worker::Planner)));
    }

    if turn.text.contains(PLANNER_MARKER) {
        return Ok(NodeCommand::goto(Goto::Worker(Worker::Planner)));
    }

    // Fast path: the coordinator's reply is the run's answer.
    Ok(NodeCommand {
        patch: StatePatch {
            messages: vec![ChatMessage::assistant(turn.text)],
            ..Default::default()
        },
        goto: Goto::End,
    })
}
