//! Shared domain types for MedFlow: workers and their registry, chat
//! messages, the plan shape, workflow events, LLM stream deltas, the
//! error taxonomy, and the configuration tree.

pub mod agents;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod plan;

pub use agents::Worker;
pub use error::{Error, Result};
