//! Supervisor node: structured routing.
//!
//! Demands `{"next": <worker> | "FINISH"}` from the model (single retry
//! inside the adapter). FINISH terminates the run; anything else must
//! name a rostered team member.

use chrono::Utc;
use serde::Deserialize;

use mf_domain::error::{Error, Result};
use mf_domain::llm::ModelClass;
use mf_domain::Worker;
use mf_llm::structured;
use mf_tools::CancelToken;

use super::super::engine::EngineDeps;
use super::super::events::EventProjector;
use super::super::prompts;
use super::super::state::{Goto, NodeCommand, StatePatch, WorkflowState};

const FINISH: &str = "FINISH";

#[derive(Debug, Deserialize)]
struct Route {
    next: String,
}

pub(crate) async fn run(
    deps: &EngineDeps,
    state: &WorkflowState,
    projector: &EventProjector,
    cancel: &CancelToken,
) -> Result<NodeCommand> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let messages = prompts::bind(Worker::Supervisor, state, Utc::now());
    let client = deps.llm.select(ModelClass::Basic);

    projector.start_llm(Worker::Supervisor).await;
    let route = structured::<Route>(client.as_ref(), messages).await;
    projector.end_llm(Worker::Supervisor).await;

    let route = route?;

    if route.next == FINISH {
        return Ok(NodeCommand::goto(Goto::End));
    }

    let worker: Worker = route
        .next
        .parse()
        .map_err(|_| Error::Workflow(format!("supervisor selected an unknown worker: {}", route.next)))?;

    if !state.roster_contains(worker) {
        return Err(Error::Workflow(format!(
            "supervisor selected a worker outside the roster: {}",
            route.next
        )));
    }

    tracing::debug!(next = %worker, "supervisor dispatch");

    Ok(NodeCommand {
        patch: StatePatch {
            next: Some(worker),
            ..Default::default()
        },
        goto: Goto::Worker(worker),
    })
}
