use serde::{Deserialize, Serialize};

use crate::llm::ModelClass;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One OpenAI-compatible endpoint serving a model class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
}

impl Default for ModelEndpoint {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            base_url: d_base_url(),
        }
    }
}

impl ModelEndpoint {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.model.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub basic: ModelEndpoint,
    #[serde(default)]
    pub reasoning: ModelEndpoint,
    #[serde(default)]
    pub vision: ModelEndpoint,
    /// Per-request timeout for LLM HTTP calls, in milliseconds.
    #[serde(default = "d_120000")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            basic: ModelEndpoint::default(),
            reasoning: ModelEndpoint::default(),
            vision: ModelEndpoint::default(),
            request_timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    pub fn endpoint(&self, class: ModelClass) -> &ModelEndpoint {
        match class {
            ModelClass::Basic => &self.basic,
            ModelClass::Reasoning => &self.reasoning,
            ModelClass::Vision => &self.vision,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_120000() -> u64 {
    120_000
}
