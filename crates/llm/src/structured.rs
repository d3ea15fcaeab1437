//! Structured (schema-coerced) invocation.
//!
//! The supervisor needs `{next: worker | "FINISH"}` back; the contract
//! is: request JSON mode, parse with the repair helper, retry once with
//! a corrective message, then surface a schema violation.

use serde::de::DeserializeOwned;

use mf_domain::error::{Error, Result};
use mf_domain::message::ChatMessage;

use crate::client::{ChatRequest, LlmClient};
use crate::repair::extract_json;

/// Invoke the model demanding output deserializable into `T`.
///
/// One retry on malformed output; the retry appends the failed output
/// and a corrective instruction so the model can see its own mistake.
pub async fn structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    messages: Vec<ChatMessage>,
) -> Result<T> {
    let req = ChatRequest {
        messages: messages.clone(),
        json_mode: true,
        temperature: Some(0.0),
        ..Default::default()
    };
    let response = client.chat(req).await?;

    match parse::<T>(&response.content) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            tracing::warn!(
                error = %first_err,
                "structured output parse failed, retrying once"
            );

            let mut retry_messages = messages;
            retry_messages.push(ChatMessage::assistant(response.content));
            retry_messages.push(ChatMessage::user(
                "The previous response was not valid JSON matching the requested \
                 shape. Respond again with ONLY the JSON object, no prose.",
            ));
            let retry = ChatRequest {
                messages: retry_messages,
                json_mode: true,
                temperature: Some(0.0),
                ..Default::default()
            };
            let response = client.chat(retry).await?;
            parse::<T>(&response.content)
                .map_err(|e| Error::SchemaViolation(e.to_string()))
        }
    }
}

fn parse<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let candidate = extract_json(raw);
    serde_json::from_str(candidate).map_err(Error::Json)
}
