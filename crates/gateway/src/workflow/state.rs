//! Live workflow state and the node command protocol.
//!
//! Workers never mutate the state directly: each node returns a
//! [`NodeCommand`] whose patch is applied atomically before `goto` is
//! consulted.

use serde::Serialize;

use mf_domain::message::ChatMessage;
use mf_domain::Worker;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkflowState
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory state of one run. Snapshotted into the session on
/// successful termination.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub workflow_id: String,
    /// The dispatchable team for this run.
    pub roster: Vec<Worker>,
    pub deep_thinking: bool,
    pub search_before_planning: bool,
    /// User turn plus each worker's produced message, in order.
    pub messages: Vec<ChatMessage>,
    /// Routing field: the worker the supervisor selected, when any.
    pub next: Option<Worker>,
    /// The most recent full plan produced by the planner.
    pub full_plan: Option<String>,
}

impl WorkflowState {
    pub fn new(
        roster: Vec<Worker>,
        deep_thinking: bool,
        search_before_planning: bool,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            workflow_id: uuid::Uuid::new_v4().to_string(),
            roster,
            deep_thinking,
            search_before_planning,
            messages,
            next: None,
            full_plan: None,
        }
    }

    pub fn roster_contains(&self, worker: Worker) -> bool {
        self.roster.contains(&worker)
    }

    /// Apply a node's patch. All fields land before `goto` is read.
    pub fn apply(&mut self, patch: StatePatch) {
        self.messages.extend(patch.messages);
        if let Some(next) = patch.next {
            self.next = Some(next);
        }
        if let Some(plan) = patch.full_plan {
            self.full_plan = Some(plan);
        }
    }

    /// The persisted form of this state (opaque JSON on the session).
    pub fn snapshot(&self) -> serde_json::Value {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            workflow_id: &'a str,
            team_members: Vec<&'static str>,
            deep_thinking_mode: bool,
            search_before_planning: bool,
            messages: Vec<serde_json::Value>,
            next: Option<&'static str>,
            full_plan: Option<&'a str>,
        }

        serde_json::to_value(Snapshot {
            workflow_id: &self.workflow_id,
            team_members: self.roster.iter().map(|w| w.as_str()).collect(),
            deep_thinking_mode: self.deep_thinking,
            search_before_planning: self.search_before_planning,
            messages: self.messages.iter().map(message_to_json).collect(),
            next: self.next.map(|w| w.as_str()),
            full_plan: self.full_plan.as_deref(),
        })
        .expect("snapshot serialization cannot fail")
    }
}

/// Client-facing JSON for one state message: role plus flattened text.
pub fn message_to_json(msg: &ChatMessage) -> serde_json::Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content.extract_all_text(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where control goes after a node completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goto {
    Worker(Worker),
    /// The terminal sentinel.
    End,
}

/// A partial update to [`WorkflowState`].
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub messages: Vec<ChatMessage>,
    pub next: Option<Worker>,
    pub full_plan: Option<String>,
}

/// A worker's return value.
#[derive(Debug, Clone)]
pub struct NodeCommand {
    pub patch: StatePatch,
    pub goto: Goto,
}

impl NodeCommand {
    pub fn goto(goto: Goto) -> Self {
        Self {
            patch: StatePatch::default(),
            goto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_atomic_and_additive() {
        let mut state = WorkflowState::new(
            vec![Worker::Researcher, Worker::Reporter],
            false,
            false,
            vec![ChatMessage::user("question")],
        );

        state.apply(StatePatch {
            messages: vec![ChatMessage::assistant("finding")],
            next: Some(Worker::Reporter),
            full_plan: Some("{}".into()),
        });

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.next, Some(Worker::Reporter));
        assert_eq!(state.full_plan.as_deref(), Some("{}"));

        // An empty patch changes nothing.
        state.apply(StatePatch::default());
        assert_eq!(state.next, Some(Worker::Reporter));
        assert_eq!(state.full_plan.as_deref(), Some("{}"));
    }

    #[test]
    fn snapshot_carries_roster_and_messages() {
        let state = WorkflowState::new(
            vec![Worker::Reporter],
            true,
            false,
            vec![ChatMessage::user("hi")],
        );
        let snapshot = state.snapshot();
        assert_eq!(snapshot["team_members"], serde_json::json!(["reporter"]));
        assert_eq!(snapshot["deep_thinking_mode"], serde_json::json!(true));
        assert_eq!(snapshot["messages"][0]["role"], "user");
        assert_eq!(snapshot["next"], serde_json::Value::Null);
    }

    #[test]
    fn workflow_ids_are_36_chars() {
        let state = WorkflowState::new(vec![Worker::Reporter], false, false, vec![]);
        assert_eq!(state.workflow_id.len(), 36);
    }
}
