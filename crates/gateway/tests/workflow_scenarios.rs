//! End-to-end workflow scenarios driven by a scripted LLM and fake
//! tools: the greeting fast path, planned research, search outages,
//! disconnects, history round trips, and malformed plans.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mf_domain::config::Config;
use mf_domain::error::Result;
use mf_domain::event::WorkflowEvent;
use mf_domain::llm::{BoxStream, ModelClass, StreamEvent};
use mf_domain::message::ChatMessage;
use mf_domain::Worker;
use mf_gateway::state::AppState;
use mf_gateway::workflow::session_lock::SessionLockMap;
use mf_gateway::workflow::{start_run, RunInput};
use mf_llm::{ChatRequest, ChatResponse, LlmClient, LlmRouter};
use mf_store::{MessageKind, MessageRole, SessionStore};
use mf_tools::browser::BrowserPool;
use mf_tools::{Tool, ToolContext, ToolError, ToolRegistry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pops one scripted turn per call: `stream_turns` feed `chat_stream`
/// (the streamed workers), `chat_turns` feed `chat` (the supervisor's
/// structured calls).
struct ScriptedLlm {
    stream_turns: Mutex<Vec<Vec<StreamEvent>>>,
    chat_turns: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(stream_turns: Vec<Vec<StreamEvent>>, chat_turns: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            stream_turns: Mutex::new(stream_turns),
            chat_turns: Mutex::new(chat_turns.into_iter().map(String::from).collect()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        let mut turns = self.chat_turns.lock();
        let content = if turns.is_empty() {
            r#"{"next": "FINISH"}"#.to_string()
        } else {
            turns.remove(0)
        };
        Ok(ChatResponse {
            content,
            tool_calls: Vec::new(),
            usage: None,
            model: "scripted".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(
        &self,
        _req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let mut turns = self.stream_turns.lock();
        let events = if turns.is_empty() {
            vec![tokens("")]
        } else {
            turns.remove(0)
        };
        Ok(Box::pin(futures_util::stream::iter(
            events.into_iter().map(Ok),
        )))
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::Basic
    }
}

fn tokens(text: &str) -> StreamEvent {
    StreamEvent::Token { text: text.into() }
}

/// A streamed turn: the text split into two chunks plus Done, so delta
/// reconstruction is actually exercised.
fn streamed(text: &str) -> Vec<StreamEvent> {
    let mid = text.len() / 2;
    let mut mid_fixed = mid;
    while !text.is_char_boundary(mid_fixed) {
        mid_fixed += 1;
    }
    vec![
        tokens(&text[..mid_fixed]),
        tokens(&text[mid_fixed..]),
        StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        },
    ]
}

/// A streamed turn that ends in one tool call.
fn streamed_tool_call(tool_name: &str, args: serde_json::Value) -> Vec<StreamEvent> {
    vec![
        StreamEvent::ToolCallFinished {
            call_id: "model_call_1".into(),
            tool_name: tool_name.into(),
            arguments: args,
        },
        StreamEvent::Done {
            usage: None,
            finish_reason: Some("tool_calls".into()),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fake tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct FakeSearch {
    fail: bool,
    calls: AtomicU32,
    delay_ms: u64,
}

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &'static str {
        "web_search"
    }
    fn description(&self) -> &'static str {
        "fake web search"
    }
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }
    fn idempotent(&self) -> bool {
        true
    }
    async fn invoke(&self, _args: serde_json::Value, _ctx: &ToolContext) -> std::result::Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            Err(ToolError::Permanent("search backend rejected the query".into()))
        } else {
            Ok("1. Treatment overview (https://example.org/a)".into())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn app_state(llm: Arc<dyn LlmClient>, search: Arc<FakeSearch>) -> AppState {
    let mut config = Config::default();
    config.storage.database_url = ":memory:".into();
    config.workflow.run_timeout_sec = 30;
    config.tools.retry.max_retries = 0;
    config.tools.retry.backoff_ms = 1;
    let config = Arc::new(config);

    let store = Arc::new(SessionStore::in_memory().unwrap());
    let mut tools = ToolRegistry::new(config.tools.retry.clone());
    tools.register(search);

    AppState {
        config: config.clone(),
        store,
        llm: LlmRouter::new(llm, None, None),
        tools: Arc::new(tools),
        browser_pool: Arc::new(BrowserPool::new(config.browser.clone())),
        session_locks: Arc::new(SessionLockMap::new()),
    }
}

fn run_input(app: &AppState, user_text: &str, roster: Vec<Worker>, search_first: bool) -> RunInput {
    let session = app.store.create_session(None).unwrap();
    RunInput {
        session_id: session.id,
        roster,
        deep_thinking: false,
        search_before_planning: search_first,
        messages: vec![ChatMessage::user(user_text)],
        user_text: user_text.into(),
        input_payload: serde_json::json!([{"role": "user", "content": user_text}]),
        debug: false,
    }
}

async fn collect(app: AppState, input: RunInput) -> (String, Vec<WorkflowEvent>) {
    let session_id = input.session_id.clone();
    let permit = app.session_locks.try_acquire(&session_id).unwrap();
    let (mut rx, _cancel) = start_run(app, input, permit);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (session_id, events)
}

fn event_types(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

fn count(events: &[WorkflowEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.event_type() == kind).count()
}

/// Check the bracket invariants: agent and llm scopes strictly nested,
/// message deltas only inside an agent bracket.
fn assert_brackets(events: &[WorkflowEvent]) {
    let mut agent_depth = 0i32;
    let mut llm_depth = 0i32;
    for event in events {
        match event.event_type() {
            "start_of_agent" => agent_depth += 1,
            "end_of_agent" => {
                agent_depth -= 1;
                assert!(agent_depth >= 0, "end_of_agent without start");
            }
            "start_of_llm" => {
                assert!(agent_depth > 0, "llm outside agent bracket");
                llm_depth += 1;
            }
            "end_of_llm" => {
                llm_depth -= 1;
                assert!(llm_depth >= 0, "end_of_llm without start");
            }
            "message" => {
                assert!(agent_depth > 0, "message outside agent bracket");
            }
            _ => {}
        }
        assert!(llm_depth <= 1, "nested llm brackets");
    }
    assert_eq!(agent_depth, 0, "unbalanced agent brackets");
    assert_eq!(llm_depth, 0, "unbalanced llm brackets");
}

/// Reassemble message texts from deltas, keyed by message_id, in
/// first-seen order.
fn reassemble_messages(events: &[WorkflowEvent]) -> Vec<String> {
    let mut order = Vec::new();
    let mut texts: HashMap<String, String> = HashMap::new();
    for event in events {
        if let WorkflowEvent::Message { message_id, delta } = event {
            if let Some(content) = &delta.content {
                if !texts.contains_key(message_id) {
                    order.push(message_id.clone());
                }
                texts.entry(message_id.clone()).or_default().push_str(content);
            }
        }
    }
    order.into_iter().map(|id| texts.remove(&id).unwrap()).collect()
}

const PLAN_JSON: &str = r#"{
  "thought": "the user needs a literature summary",
  "title": "Condition X treatment research",
  "steps": [
    {"agent_name": "researcher", "title": "Gather", "description": "search recent sources"},
    {"agent_name": "reporter", "title": "Report", "description": "write the summary"}
  ]
}"#;

const REPORT_TEXT: &str = "Summary: recent treatment options include A and B.\n\nSources:\n- https://example.org/a\n\nThis is information, not medical advice.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S1 — trivial greeting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn s1_greeting_fast_path() {
    let llm = ScriptedLlm::new(vec![streamed("Hello! How can I help you today?")], vec![]);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(&app, "hi", mf_domain::agents::default_roster(), false);

    let (session_id, events) = collect(app.clone(), input).await;

    let types = event_types(&events);
    assert_eq!(
        types,
        vec![
            "session_id",
            "start_of_agent",
            "start_of_llm",
            "message",
            "message",
            "end_of_llm",
            "end_of_agent",
            "end_of_workflow",
            "final_session_state",
        ]
    );
    assert_brackets(&events);
    // The fast path never enters the workflow envelope.
    assert_eq!(count(&events, "start_of_workflow"), 0);

    // Delta reconstruction matches the persisted assistant message.
    let texts = reassemble_messages(&events);
    assert_eq!(texts, vec!["Hello! How can I help you today?".to_string()]);

    let messages = app.store.list_messages(&session_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "Hello! How can I help you today?");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S2 — planned research
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn s2_scripts() -> (Vec<Vec<StreamEvent>>, Vec<&'static str>) {
    let stream_turns = vec![
        // coordinator
        streamed("handoff_to_planner"),
        // planner
        streamed(PLAN_JSON),
        // researcher, turn 1: calls the search tool
        streamed_tool_call("web_search", serde_json::json!({"query": "condition X treatment"})),
        // researcher, turn 2: answers from the observation
        streamed("Found two recent options with sources."),
        // reporter
        streamed(REPORT_TEXT),
    ];
    let chat_turns = vec![r#"{"next": "researcher"}"#, r#"{"next": "reporter"}"#];
    (stream_turns, chat_turns)
}

#[tokio::test]
async fn s2_planned_research() {
    let (stream_turns, chat_turns) = s2_scripts();
    let llm = ScriptedLlm::new(stream_turns, chat_turns);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search.clone());
    let input = run_input(
        &app,
        "Summarize recent treatment options for condition X",
        vec![Worker::Researcher, Worker::Reporter],
        false,
    );

    let (session_id, events) = collect(app.clone(), input).await;

    assert_brackets(&events);
    assert_eq!(count(&events, "start_of_workflow"), 1);
    assert_eq!(count(&events, "end_of_workflow"), 1);
    assert_eq!(count(&events, "error"), 0);
    assert!(count(&events, "tool_call") >= 1);
    assert_eq!(count(&events, "tool_call"), count(&events, "tool_call_result"));
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);

    // start_of_workflow precedes every worker dispatch.
    let types = event_types(&events);
    let wf_pos = types.iter().position(|t| *t == "start_of_workflow").unwrap();
    let first_tool = types.iter().position(|t| *t == "tool_call").unwrap();
    assert!(wf_pos < first_tool);

    // Tool call ids follow the discipline and match across the bracket.
    let (call_id, result_id) = events
        .iter()
        .fold((None, None), |(c, r), e| match e {
            WorkflowEvent::ToolCall { tool_call_id, .. } => (Some(tool_call_id.clone()), r),
            WorkflowEvent::ToolCallResult { tool_call_id, .. } => (c, Some(tool_call_id.clone())),
            _ => (c, r),
        });
    let call_id = call_id.unwrap();
    assert_eq!(Some(call_id.clone()), result_id);
    assert!(call_id.contains("_researcher_web_search_"));

    // History: user turn, plan envelope, researcher note, reporter last.
    let messages = app.store.list_messages(&session_id).unwrap();
    assert_eq!(messages[0].role, MessageRole::User);

    let workflow_msgs: Vec<_> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::Workflow)
        .collect();
    assert_eq!(workflow_msgs.len(), 1);
    let envelope: serde_json::Value = serde_json::from_str(&workflow_msgs[0].content).unwrap();
    assert_eq!(envelope["workflow"]["title"], "Condition X treatment research");

    let last = messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.kind, MessageKind::Text);
    assert_eq!(last.content, REPORT_TEXT);

    // Reporter text reconstructed from stream deltas equals history.
    let texts = reassemble_messages(&events);
    assert_eq!(texts.last().unwrap(), REPORT_TEXT);

    // The snapshot landed on the session.
    let session = app.store.get_session(&session_id).unwrap().unwrap();
    let state = session.state.unwrap();
    assert_eq!(state["team_members"], serde_json::json!(["researcher", "reporter"]));
    assert!(state["full_plan"].is_string());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S3 — search-before-planning outage is non-fatal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn s3_search_outage_before_planning() {
    let stream_turns = vec![
        streamed("handoff_to_planner"),
        streamed(PLAN_JSON),
        // researcher answers without tools in this variant
        streamed("Answered from prior knowledge of the sources."),
        streamed(REPORT_TEXT),
    ];
    let chat_turns = vec![r#"{"next": "researcher"}"#, r#"{"next": "reporter"}"#];
    let llm = ScriptedLlm::new(stream_turns, chat_turns);
    let search = Arc::new(FakeSearch { fail: true, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search.clone());
    let input = run_input(
        &app,
        "Summarize recent treatment options for condition X",
        vec![Worker::Researcher, Worker::Reporter],
        true,
    );

    let (_session_id, events) = collect(app.clone(), input).await;

    // The failed pre-search was attempted, logged, and not surfaced.
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(count(&events, "error"), 0);
    assert_eq!(count(&events, "end_of_workflow"), 1);
    assert_brackets(&events);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S4 — disconnect mid-run cancels and persists nothing partial
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn s4_disconnect_mid_run() {
    let (stream_turns, chat_turns) = s2_scripts();
    let llm = ScriptedLlm::new(stream_turns, chat_turns);
    // Slow tool so cancellation lands mid-invocation.
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 500 });
    let app = app_state(llm, search);
    let input = run_input(
        &app,
        "Summarize recent treatment options for condition X",
        vec![Worker::Researcher, Worker::Reporter],
        false,
    );
    let session_id = input.session_id.clone();

    let permit = app.session_locks.try_acquire(&session_id).unwrap();
    let (mut rx, cancel) = start_run(app.clone(), input, permit);

    // Read until the first tool_call, then "disconnect".
    let mut saw_tool_call = false;
    while let Some(event) = rx.recv().await {
        if event.event_type() == "tool_call" {
            saw_tool_call = true;
            break;
        }
    }
    assert!(saw_tool_call);
    cancel.cancel();
    drop(rx);

    // The run lock is released once the task unwinds.
    let mut released = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        if let Ok(p) = app.session_locks.try_acquire(&session_id) {
            drop(p);
            released = true;
            break;
        }
    }
    assert!(released, "run lock was not released after cancellation");

    // Only the user turn is in history; no snapshot was written.
    let messages = app.store.list_messages(&session_id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
    let session = app.store.get_session(&session_id).unwrap().unwrap();
    assert!(session.state.is_none());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S5 — resume after refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn s5_resume_after_refresh() {
    let llm = ScriptedLlm::new(vec![streamed("Hello!")], vec![]);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(&app, "hi", mf_domain::agents::default_roster(), false);

    let (session_id, events) = collect(app.clone(), input).await;

    // The session id was announced before any work.
    assert_eq!(events[0].event_type(), "session_id");

    // "Reload": fetch history through the store's client shape.
    let history = app.store.format_history(&session_id).unwrap();
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert!(!history["state"].is_null());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// S6 — malformed plan terminates the run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn s6_malformed_plan() {
    let stream_turns = vec![
        streamed("handoff_to_planner"),
        streamed("I think the plan should be to search first and then report."),
    ];
    let llm = ScriptedLlm::new(stream_turns, vec![]);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(
        &app,
        "Summarize recent treatment options for condition X",
        vec![Worker::Researcher, Worker::Reporter],
        false,
    );

    let (session_id, events) = collect(app.clone(), input).await;

    assert_eq!(count(&events, "error"), 1);
    assert_eq!(count(&events, "end_of_workflow"), 0);
    assert_brackets(&events);

    // History advanced: user turn plus an assistant error text.
    let messages = app.store.list_messages(&session_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert!(messages[1].content.contains("invalid plan"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor picking outside the roster fails the run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn supervisor_outside_roster_fails() {
    let stream_turns = vec![streamed("handoff_to_planner"), streamed(PLAN_JSON)];
    // Coder is registered but not in this run's roster.
    let chat_turns = vec![r#"{"next": "coder"}"#, r#"{"next": "coder"}"#];
    let llm = ScriptedLlm::new(stream_turns, chat_turns);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(
        &app,
        "Summarize recent treatment options for condition X",
        vec![Worker::Researcher, Worker::Reporter],
        false,
    );

    let (_session_id, events) = collect(app.clone(), input).await;

    assert_eq!(count(&events, "error"), 1);
    assert_eq!(count(&events, "end_of_workflow"), 0);
    let detail = events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::Error { detail } => Some(detail.clone()),
            _ => None,
        })
        .unwrap();
    assert!(detail.contains("roster"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Translator runs before planning when the coordinator asks for it
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn translator_runs_before_planning() {
    let plan = r#"{
        "thought": "translated request needs a report",
        "title": "Translated research",
        "steps": [{"agent_name": "reporter", "title": "Report", "description": "answer"}]
    }"#;
    let stream_turns = vec![
        // coordinator routes through the translator
        streamed("handoff_to_translator"),
        // translator
        streamed("Translated request: what are treatment options for condition X?"),
        // planner
        streamed(plan),
        // reporter
        streamed(REPORT_TEXT),
    ];
    let chat_turns = vec![r#"{"next": "reporter"}"#];
    let llm = ScriptedLlm::new(stream_turns, chat_turns);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(
        &app,
        "¿Cuáles son las opciones de tratamiento para la condición X?",
        vec![Worker::Translator, Worker::Reporter],
        false,
    );

    let (session_id, events) = collect(app.clone(), input).await;

    assert_brackets(&events);
    assert_eq!(count(&events, "end_of_workflow"), 1);
    assert_eq!(count(&events, "error"), 0);

    // Agent order: coordinator, translator, planner, supervisor, reporter.
    let agents: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::StartOfAgent { agent_name, .. } => Some(agent_name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        agents,
        vec!["coordinator", "translator", "planner", "supervisor", "reporter"]
    );

    // The translated text reached the session log before the report.
    let messages = app.store.list_messages(&session_id).unwrap();
    assert!(messages
        .iter()
        .any(|m| m.content.contains("Translated request:")));
    assert_eq!(messages.last().unwrap().content, REPORT_TEXT);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// A second turn on a busy session is rejected
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn busy_session_rejects_second_run() {
    let llm = ScriptedLlm::new(vec![streamed("Hello!")], vec![]);
    let search = Arc::new(FakeSearch { fail: false, calls: AtomicU32::new(0), delay_ms: 0 });
    let app = app_state(llm, search);
    let input = run_input(&app, "hi", mf_domain::agents::default_roster(), false);
    let session_id = input.session_id.clone();

    let _held = app.session_locks.try_acquire(&session_id).unwrap();
    assert!(app.session_locks.try_acquire(&session_id).is_err());
}
