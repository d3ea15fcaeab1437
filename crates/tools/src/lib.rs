//! The tool layer: a uniform capability registry with typed errors,
//! bounded retry for transient failures, progress callbacks, and the
//! per-worker toolsets the react agents run with.

pub mod abstracts;
pub mod browser;
pub mod cancel;
pub mod crawl;
pub mod error;
pub mod exec;
pub mod search;

pub use cancel::CancelToken;
pub use error::ToolError;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use mf_domain::config::RetryConfig;
use mf_domain::message::ToolDefinition;
use mf_domain::Worker;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Progress emitted by a long-running tool mid-invocation, keyed by the
/// run-unique tool-call id. Picked up by the event projector.
#[derive(Debug, Clone)]
pub struct ToolProgress {
    pub tool_call_id: String,
    pub tool_name: String,
    pub payload: Value,
}

/// Per-invocation context handed to a tool.
#[derive(Clone)]
pub struct ToolContext {
    /// Run-unique tool-call identifier.
    pub tool_call_id: String,
    /// The invoked tool's name (echoed in progress callbacks).
    pub tool_name: String,
    /// Cooperative cancellation for the owning run.
    pub cancel: CancelToken,
    /// Where progress callbacks go (None when the caller doesn't stream).
    pub progress: Option<mpsc::Sender<ToolProgress>>,
}

impl ToolContext {
    /// Fire a progress callback. Best-effort: a full or closed channel
    /// drops the update rather than blocking the tool.
    pub fn report_progress(&self, payload: Value) {
        if let Some(tx) = &self.progress {
            let _ = tx.try_send(ToolProgress {
                tool_call_id: self.tool_call_id.clone(),
                tool_name: self.tool_name.clone(),
                payload,
            });
        }
    }
}

/// A capability the react agents can invoke.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;
    /// Idempotent tools may be retried on transient failure.
    fn idempotent(&self) -> bool;

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The process-wide capability registry.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    retry: RetryConfig,
}

impl ToolRegistry {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            tools: HashMap::new(),
            retry,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions for a set of tool names (order preserved;
    /// unknown names are skipped — the worker simply runs without them).
    pub fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Invoke a tool with bounded-backoff retry on transient failures.
    ///
    /// Validation and permanent errors are returned immediately;
    /// non-idempotent tools are never retried.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Validation(format!("unknown tool: {name}")))?;

        let attempts = if tool.idempotent() {
            self.retry.max_retries + 1
        } else {
            1
        };

        let mut backoff = std::time::Duration::from_millis(self.retry.backoff_ms);
        let mut last_err = None;

        for attempt in 0..attempts {
            if ctx.cancel.is_cancelled() {
                return Err(ToolError::Permanent("run cancelled".into()));
            }

            match tool.invoke(args.clone(), ctx).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    tracing::warn!(
                        tool = name,
                        attempt,
                        error = %e,
                        "transient tool failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| ToolError::Permanent("no attempts made".into())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-worker toolsets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The tools each worker runs with. Workers not listed here are pure
/// LLM (reporter, translator, and the graph infrastructure).
pub fn toolset(worker: Worker) -> &'static [&'static str] {
    match worker {
        Worker::Researcher => &["web_search", "crawl", "abstract_search"],
        Worker::Coder => &["python_exec", "shell_exec"],
        Worker::Browser => &["browser"],
        Worker::Coordinator
        | Worker::Planner
        | Worker::Supervisor
        | Worker::Reporter
        | Worker::Translator => &[],
    }
}
