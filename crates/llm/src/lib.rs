//! LLM adapter: one OpenAI-compatible client per model class, a router
//! applying the selection policy, streaming with tool-call assembly,
//! and schema-coerced structured invocation.

mod client;
mod openai_compat;
mod repair;
mod sse;
mod structured;

pub use client::{ChatRequest, ChatResponse, LlmClient, LlmRouter};
pub use openai_compat::OpenAiCompatClient;
pub use repair::extract_json;
pub use structured::structured;
