use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Soft per-run timeout; when it fires, the run is cancelled with
    /// reason `timeout`. In seconds.
    #[serde(default = "d_600")]
    pub run_timeout_sec: u64,
    /// Bound on LLM → tool → observation iterations inside one worker.
    #[serde(default = "d_10")]
    pub max_react_loops: usize,
    /// Bound on node transitions in one run (defends against routing loops).
    #[serde(default = "d_40")]
    pub max_steps: usize,
    /// Event channel capacity between engine and transport.
    #[serde(default = "d_64")]
    pub event_buffer: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            run_timeout_sec: 600,
            max_react_loops: 10,
            max_steps: 40,
            event_buffer: 64,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_600() -> u64 {
    600
}
fn d_10() -> usize {
    10
}
fn d_40() -> usize {
    40
}
fn d_64() -> usize {
    64
}
