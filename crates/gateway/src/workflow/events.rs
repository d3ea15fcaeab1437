//! The event projector: the single writer of a run's event channel.
//!
//! Owns the run-local counters behind the identifier discipline
//! (`agent_id = {workflow_id}_{worker}_{step}`,
//! `tool_call_id = {workflow_id}_{worker}_{tool}_{n}`) and forwards
//! tool progress callbacks as repeated `tool_call` events.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use mf_domain::event::{MessageDelta, WorkflowEvent};
use mf_domain::Worker;
use mf_tools::ToolProgress;

pub struct EventProjector {
    workflow_id: String,
    tx: mpsc::Sender<WorkflowEvent>,
    step: AtomicU64,
    tool_seq: AtomicU64,
}

impl EventProjector {
    pub fn new(workflow_id: impl Into<String>, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            tx,
            step: AtomicU64::new(0),
            tool_seq: AtomicU64::new(0),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Push one event. A gone receiver is not an error: the client
    /// disconnected and cancellation is already in flight.
    pub async fn emit(&self, event: WorkflowEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!(workflow_id = %self.workflow_id, "event receiver dropped");
        }
    }

    /// Mint the next agent id for a worker.
    pub fn next_agent_id(&self, worker: Worker) -> String {
        let step = self.step.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", self.workflow_id, worker.as_str(), step)
    }

    /// Mint the next run-unique tool call id.
    pub fn next_tool_call_id(&self, worker: Worker, tool_name: &str) -> String {
        let n = self.tool_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}_{}", self.workflow_id, worker.as_str(), tool_name, n)
    }

    // ── Bracket helpers ────────────────────────────────────────────

    pub async fn start_agent(&self, worker: Worker) -> String {
        let agent_id = self.next_agent_id(worker);
        self.emit(WorkflowEvent::StartOfAgent {
            agent_id: agent_id.clone(),
            agent_name: worker.as_str().into(),
        })
        .await;
        agent_id
    }

    pub async fn end_agent(&self, agent_id: String) {
        self.emit(WorkflowEvent::EndOfAgent { agent_id }).await;
    }

    pub async fn start_llm(&self, worker: Worker) {
        self.emit(WorkflowEvent::StartOfLlm {
            agent_name: worker.as_str().into(),
        })
        .await;
    }

    pub async fn end_llm(&self, worker: Worker) {
        self.emit(WorkflowEvent::EndOfLlm {
            agent_name: worker.as_str().into(),
        })
        .await;
    }

    pub async fn message_delta(
        &self,
        message_id: &str,
        content: Option<String>,
        reasoning_content: Option<String>,
    ) {
        self.emit(WorkflowEvent::Message {
            message_id: message_id.to_string(),
            delta: MessageDelta {
                content,
                reasoning_content,
            },
        })
        .await;
    }

    /// Project a tool progress callback: a repeated `tool_call` event
    /// with the same id, carrying the progress payload as input.
    pub async fn tool_progress(&self, progress: ToolProgress) {
        self.emit(WorkflowEvent::ToolCall {
            tool_call_id: progress.tool_call_id,
            tool_name: progress.tool_name,
            tool_input: progress.payload,
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn agent_ids_follow_the_discipline() {
        let (tx, _rx) = mpsc::channel(8);
        let projector = EventProjector::new("wf1", tx);

        assert_eq!(projector.next_agent_id(Worker::Coordinator), "wf1_coordinator_0");
        assert_eq!(projector.next_agent_id(Worker::Planner), "wf1_planner_1");
        assert_eq!(
            projector.next_tool_call_id(Worker::Researcher, "web_search"),
            "wf1_researcher_web_search_0"
        );
        assert_eq!(
            projector.next_tool_call_id(Worker::Researcher, "crawl"),
            "wf1_researcher_crawl_1"
        );
    }

    #[tokio::test]
    async fn brackets_emit_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let projector = EventProjector::new("wf1", tx);

        let agent_id = projector.start_agent(Worker::Coordinator).await;
        projector.start_llm(Worker::Coordinator).await;
        projector.end_llm(Worker::Coordinator).await;
        projector.end_agent(agent_id).await;

        let types: Vec<&str> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.event_type())
        .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec!["start_of_agent", "start_of_llm", "end_of_llm", "end_of_agent"]
        );
    }

    #[tokio::test]
    async fn emit_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let projector = EventProjector::new("wf1", tx);
        // Must not panic or error.
        projector
            .emit(WorkflowEvent::SessionId {
                session_id: "s".into(),
            })
            .await;
    }
}
