//! The closed set of workflow events pushed to the client.
//!
//! Each variant serializes to the bare payload object; the stream
//! transport frames it as `event: <type>\ndata: <json>\n\n` using
//! [`WorkflowEvent::event_type`].

use serde::Serialize;

/// Delta payload of a `message` event. Concatenating the `content`
/// fields for one `message_id` reconstructs the final message text.
#[derive(Debug, Clone, Serialize, Default)]
pub struct MessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

/// Everything the engine surfaces about a run, in emission order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowEvent {
    /// Emitted once, before any work, so the client can persist the id.
    SessionId { session_id: String },

    /// Emitted once, at planner entry. Coordinator-only fast paths never
    /// carry a workflow envelope.
    StartOfWorkflow {
        workflow_id: String,
        input: serde_json::Value,
    },

    StartOfAgent {
        agent_id: String,
        agent_name: String,
    },
    EndOfAgent { agent_id: String },

    StartOfLlm { agent_name: String },
    EndOfLlm { agent_name: String },

    Message {
        message_id: String,
        delta: MessageDelta,
    },

    ToolCall {
        tool_call_id: String,
        tool_name: String,
        tool_input: serde_json::Value,
    },
    ToolCallResult {
        tool_call_id: String,
        tool_name: String,
        tool_result: String,
    },

    EndOfWorkflow {
        workflow_id: String,
        messages: Vec<serde_json::Value>,
    },

    /// Snapshot handed to the client for display rehydration.
    FinalSessionState { messages: Vec<serde_json::Value> },

    /// Terminal failure surfaced on the stream (sanitised).
    Error { detail: String },
}

impl WorkflowEvent {
    /// The SSE `event:` field for this variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::SessionId { .. } => "session_id",
            WorkflowEvent::StartOfWorkflow { .. } => "start_of_workflow",
            WorkflowEvent::StartOfAgent { .. } => "start_of_agent",
            WorkflowEvent::EndOfAgent { .. } => "end_of_agent",
            WorkflowEvent::StartOfLlm { .. } => "start_of_llm",
            WorkflowEvent::EndOfLlm { .. } => "end_of_llm",
            WorkflowEvent::Message { .. } => "message",
            WorkflowEvent::ToolCall { .. } => "tool_call",
            WorkflowEvent::ToolCallResult { .. } => "tool_call_result",
            WorkflowEvent::EndOfWorkflow { .. } => "end_of_workflow",
            WorkflowEvent::FinalSessionState { .. } => "final_session_state",
            WorkflowEvent::Error { .. } => "error",
        }
    }
}
