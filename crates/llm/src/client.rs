use std::sync::Arc;

use mf_domain::config::LlmConfig;
use mf_domain::error::Result;
use mf_domain::llm::{BoxStream, ModelClass, StreamEvent, Usage};
use mf_domain::message::{ChatMessage, ToolCall, ToolDefinition};
use mf_domain::Worker;

use crate::openai_compat::OpenAiCompatClient;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature. `None` lets the endpoint choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the endpoint choose.
    pub max_tokens: Option<u32>,
    /// When `true`, request the model to respond with valid JSON only.
    pub json_mode: bool,
}

/// An adapter-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Textual content of the response.
    pub content: String,
    /// Tool calls emitted by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information.
    pub usage: Option<Usage>,
    /// The model that actually produced the response.
    pub model: String,
    /// Why the model stopped (e.g. "stop", "tool_calls").
    pub finish_reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter must implement.
///
/// Production uses the OpenAI-compatible HTTP client; tests script the
/// trait directly to drive the engine without a network.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// Send a chat completion request and return a stream of events.
    async fn chat_stream(&self, req: ChatRequest)
        -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Which model class this client serves.
    fn model_class(&self) -> ModelClass;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds one client per configured model class and applies the selection
/// policy. Reasoning and vision fall back to basic when unconfigured, so
/// a minimally-configured deployment still answers every worker.
#[derive(Clone)]
pub struct LlmRouter {
    basic: Arc<dyn LlmClient>,
    reasoning: Option<Arc<dyn LlmClient>>,
    vision: Option<Arc<dyn LlmClient>>,
}

impl LlmRouter {
    pub fn new(
        basic: Arc<dyn LlmClient>,
        reasoning: Option<Arc<dyn LlmClient>>,
        vision: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self {
            basic,
            reasoning,
            vision,
        }
    }

    /// Build HTTP clients from the endpoint configuration.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let basic: Arc<dyn LlmClient> =
            Arc::new(OpenAiCompatClient::new(ModelClass::Basic, config)?);
        let reasoning = if config.reasoning.is_configured() {
            Some(Arc::new(OpenAiCompatClient::new(ModelClass::Reasoning, config)?)
                as Arc<dyn LlmClient>)
        } else {
            None
        };
        let vision = if config.vision.is_configured() {
            Some(Arc::new(OpenAiCompatClient::new(ModelClass::Vision, config)?)
                as Arc<dyn LlmClient>)
        } else {
            None
        };
        Ok(Self::new(basic, reasoning, vision))
    }

    /// Resolve the client for a model class (falling back to basic).
    pub fn select(&self, class: ModelClass) -> Arc<dyn LlmClient> {
        match class {
            ModelClass::Basic => self.basic.clone(),
            ModelClass::Reasoning => self
                .reasoning
                .clone()
                .unwrap_or_else(|| self.basic.clone()),
            ModelClass::Vision => self.vision.clone().unwrap_or_else(|| self.basic.clone()),
        }
    }

    /// Selection policy: reasoning when deep-thinking is on, vision for
    /// the browser worker, basic otherwise.
    pub fn class_for(worker: Worker, deep_thinking: bool) -> ModelClass {
        match worker {
            Worker::Browser => ModelClass::Vision,
            Worker::Planner if deep_thinking => ModelClass::Reasoning,
            _ => worker.default_model_class(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_policy_selects_by_flag_and_worker() {
        assert_eq!(
            LlmRouter::class_for(Worker::Planner, true),
            ModelClass::Reasoning
        );
        assert_eq!(
            LlmRouter::class_for(Worker::Planner, false),
            ModelClass::Basic
        );
        assert_eq!(
            LlmRouter::class_for(Worker::Browser, false),
            ModelClass::Vision
        );
        assert_eq!(
            LlmRouter::class_for(Worker::Reporter, true),
            ModelClass::Basic
        );
    }
}
