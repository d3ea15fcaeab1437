/// Shared error type used across all MedFlow crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("llm {class}: {message}")]
    Llm { class: String, message: String },

    #[error("model output did not match the requested schema: {0}")]
    SchemaViolation(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid roster: {0}")]
    Roster(String),

    #[error("config: {0}")]
    Config(String),

    #[error("workflow: {0}")]
    Workflow(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
