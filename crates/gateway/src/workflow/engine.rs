//! The state-graph interpreter.
//!
//! Runs nodes strictly sequentially: each returns a [`NodeCommand`],
//! the patch lands atomically, and `goto` picks the next node or ends
//! the run. The only parallelism lives inside tool calls.

use std::sync::Arc;

use tokio::sync::mpsc;

use mf_domain::config::WorkflowConfig;
use mf_domain::error::{Error, Result};
use mf_domain::event::WorkflowEvent;
use mf_domain::message::ChatMessage;
use mf_domain::Worker;
use mf_llm::LlmRouter;
use mf_tools::{CancelToken, ToolProgress, ToolRegistry};

use super::events::EventProjector;
use super::nodes;
use super::state::{Goto, WorkflowState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dependencies & outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a node needs besides the state itself.
pub struct EngineDeps {
    pub llm: LlmRouter,
    pub tools: Arc<ToolRegistry>,
    pub config: WorkflowConfig,
    /// Sink for tool progress callbacks (forwarded by the projector).
    pub progress: mpsc::Sender<ToolProgress>,
}

/// How a run ended (cancellation propagates as [`Error::Cancelled`]).
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed { detail: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The interpreter loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Interpret the graph from START until a terminal sentinel, an
/// unrecoverable node error, or cancellation.
///
/// `input` is the client's original messages payload, echoed in
/// `start_of_workflow` (emitted at planner entry; coordinator-only
/// fast paths never enter the workflow envelope).
pub async fn run_workflow(
    deps: &EngineDeps,
    state: &mut WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
    input: &serde_json::Value,
) -> Result<RunOutcome> {
    let mut current = Worker::Coordinator;
    let mut workflow_started = false;

    for step in 0..deps.config.max_steps {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if current == Worker::Planner && !workflow_started {
            projector
                .emit(WorkflowEvent::StartOfWorkflow {
                    workflow_id: state.workflow_id.clone(),
                    input: input.clone(),
                })
                .await;
            workflow_started = true;
        }

        tracing::debug!(step, node = %current, "entering node");
        let agent_id = projector.start_agent(current).await;

        let command = match nodes::run_node(current, deps, state, projector, cancel).await {
            Ok(command) => command,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                projector.end_agent(agent_id).await;
                let detail = sanitize(&e);
                tracing::error!(node = %current, error = %e, "node failed, terminating run");
                state.messages.push(ChatMessage::assistant(format!(
                    "The run could not be completed: {detail}"
                )));
                return Ok(RunOutcome::Failed { detail });
            }
        };

        // The whole patch lands before goto is consulted.
        state.apply(command.patch);
        projector.end_agent(agent_id).await;

        match command.goto {
            Goto::End => return Ok(RunOutcome::Completed),
            Goto::Worker(next) => {
                if is_team_member(next) && !state.roster_contains(next) {
                    let detail = format!("routing to a worker outside the roster: {next}");
                    state.messages.push(ChatMessage::assistant(format!(
                        "The run could not be completed: {detail}"
                    )));
                    return Ok(RunOutcome::Failed { detail });
                }
                current = next;
            }
        }
    }

    let detail = format!("workflow exceeded {} steps", deps.config.max_steps);
    state.messages.push(ChatMessage::assistant(format!(
        "The run could not be completed: {detail}"
    )));
    Ok(RunOutcome::Failed { detail })
}

/// Whether a worker is dispatchable team (vs graph infrastructure).
fn is_team_member(worker: Worker) -> bool {
    !matches!(
        worker,
        Worker::Coordinator | Worker::Planner | Worker::Supervisor
    )
}

/// Map an internal error to the sanitised detail shown to clients.
/// Raw provider bodies and IO chains never reach the stream.
pub fn sanitize(error: &Error) -> String {
    match error {
        Error::Workflow(msg) => msg.clone(),
        Error::SchemaViolation(_) => "the model did not produce the requested structure".into(),
        Error::Llm { class, .. } => format!("the {class} language model call failed"),
        Error::Timeout(_) => "an upstream call timed out".into(),
        Error::Http(_) => "an upstream call failed".into(),
        Error::Storage(_) | Error::SessionNotFound(_) => "session storage failed".into(),
        Error::Cancelled => "the run was cancelled".into(),
        _ => "internal error".into(),
    }
}
