//! OpenAI-compatible adapter.
//!
//! Each model class {basic, reasoning, vision} is one instance of this
//! client pointed at its configured endpoint. Works with OpenAI, Azure
//! front-ends, DeepSeek, Qwen, and any other endpoint speaking the chat
//! completions contract. Reasoning endpoints that emit
//! `delta.reasoning_content` are surfaced as [`StreamEvent::Reasoning`].
//!
//! The wire format is modelled as typed serde structs (the `Wire*`
//! family below); requests are built by flattening a [`ChatMessage`]'s
//! content parts in a single pass, with image parts forwarded only for
//! the vision class.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use mf_domain::config::LlmConfig;
use mf_domain::error::{Error, Result};
use mf_domain::llm::{BoxStream, ModelClass, StreamEvent, Usage};
use mf_domain::message::{ChatMessage, ContentPart, MessageContent, Role, ToolCall};

use crate::client::{ChatRequest, ChatResponse, LlmClient};
use crate::sse;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatClient {
    class: ModelClass,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(class: ModelClass, config: &LlmConfig) -> Result<Self> {
        let endpoint = config.endpoint(class);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            class,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, req: &ChatRequest, stream: bool) -> Value {
        // Only the vision class forwards image parts; everyone else
        // gets the flattened text so images are silently ignored.
        let with_images = self.class == ModelClass::Vision;
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| wire_message(m, with_images))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("llm {}: {e}", self.class.as_str()))
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Llm {
                class: self.class.as_str().into(),
                message: format!("HTTP {status}: {text}"),
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(&req, false);
        let response = self.post(&body).await?;
        let completion: WireCompletion = response
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| Error::Llm {
            class: self.class.as_str().into(),
            message: "no choices in response".into(),
        })?;
        let message = choice.message.unwrap_or_default();

        Ok(ChatResponse {
            content: message.content.unwrap_or_default(),
            tool_calls: message
                .tool_calls
                .into_iter()
                .filter_map(complete_tool_call)
                .collect(),
            usage: completion.usage.map(Into::into),
            model: completion.model.unwrap_or_else(|| "unknown".into()),
            finish_reason: choice.finish_reason,
        })
    }

    async fn chat_stream(
        &self,
        req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_body(&req, true);
        let response = self.post(&body).await?;

        let mut assembly: ToolCallAssembly = HashMap::new();

        Ok(sse::event_stream(response, move |payload| {
            parse_stream_payload(payload, &mut assembly)
        }))
    }

    fn model_class(&self) -> ModelClass {
        self.class
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a [`ChatMessage`]'s content can carry, collected in one
/// pass. The role then decides which pieces make it onto the wire.
#[derive(Default)]
struct FlatContent<'a> {
    texts: Vec<&'a str>,
    tool_uses: Vec<(&'a str, &'a str, &'a Value)>,
    tool_result: Option<(&'a str, &'a str)>,
    images: Vec<&'a str>,
}

impl<'a> FlatContent<'a> {
    fn collect(content: &'a MessageContent, with_images: bool) -> Self {
        let mut flat = FlatContent::default();
        match content {
            MessageContent::Text(t) => flat.texts.push(t),
            MessageContent::Parts(parts) => {
                for part in parts {
                    match part {
                        ContentPart::Text { text } => flat.texts.push(text),
                        ContentPart::ToolUse { id, name, input } => {
                            flat.tool_uses.push((id, name, input))
                        }
                        ContentPart::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => flat.tool_result = Some((tool_use_id, content)),
                        ContentPart::Image { image_url, .. } if with_images => {
                            flat.images.push(image_url)
                        }
                        ContentPart::Image { .. } => {}
                    }
                }
            }
        }
        flat
    }

    fn joined_text(&self) -> String {
        self.texts.join("\n")
    }
}

/// Flatten one chat message into the chat completions wire form.
fn wire_message(msg: &ChatMessage, with_images: bool) -> Value {
    let flat = FlatContent::collect(&msg.content, with_images);

    match msg.role {
        Role::Tool => {
            let (id, content) = match flat.tool_result {
                Some(pair) => pair,
                // Fallback for a tool message without a result part.
                None => ("", ""),
            };
            serde_json::json!({
                "role": "tool",
                "tool_call_id": id,
                "content": if content.is_empty() { flat.joined_text() } else { content.to_string() },
            })
        }

        Role::Assistant => {
            let mut wire = serde_json::json!({
                "role": "assistant",
                "content": if flat.texts.is_empty() {
                    Value::Null
                } else {
                    Value::String(flat.joined_text())
                },
            });
            if !flat.tool_uses.is_empty() {
                wire["tool_calls"] = flat
                    .tool_uses
                    .iter()
                    .map(|(id, name, input)| {
                        serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": input.to_string()},
                        })
                    })
                    .collect();
            }
            wire
        }

        // User/system: multimodal array only when images survived the
        // class filter, plain text otherwise.
        _ if !flat.images.is_empty() => {
            let mut parts: Vec<Value> = flat
                .texts
                .iter()
                .map(|t| serde_json::json!({"type": "text", "text": t}))
                .collect();
            parts.extend(flat.images.iter().map(|url| {
                serde_json::json!({"type": "image_url", "image_url": {"url": url}})
            }));
            serde_json::json!({"role": msg.role.as_str(), "content": parts})
        }
        _ => serde_json::json!({
            "role": msg.role.as_str(),
            "content": flat.joined_text(),
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One chat completions response or streaming chunk. The same shape
/// covers both: full responses populate `message`, chunks populate
/// `delta`, and the usage-only trailer has neither.
#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireChatMessage>,
    #[serde(default)]
    delta: Option<WireDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    index: u64,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: WireFunction,
}

#[derive(Debug, Default, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(w: WireUsage) -> Self {
        Usage {
            prompt_tokens: w.prompt_tokens,
            completion_tokens: w.completion_tokens,
            total_tokens: w.total_tokens,
        }
    }
}

/// A non-streamed tool call is complete when it has both an id and a
/// function name; anything else is dropped.
fn complete_tool_call(tc: WireToolCall) -> Option<ToolCall> {
    let call_id = tc.id?;
    let tool_name = tc.function.name?;
    Some(ToolCall {
        call_id,
        tool_name,
        arguments: decode_arguments(tc.function.arguments.as_deref().unwrap_or(""), None),
    })
}

/// Lenient argument decoding: the empty string is a zero-arg call, and
/// invalid JSON degrades to an empty object rather than killing the
/// turn.
fn decode_arguments(raw: &str, call_id: Option<&str>) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(
            call_id = call_id.unwrap_or("unknown"),
            error = %e,
            "tool call arguments are not valid JSON; defaulting to empty object"
        );
        Value::Object(Default::default())
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming chunk handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-flight tool call, assembled across chunks and keyed by the wire
/// index.
struct PendingCall {
    id: String,
    name: String,
    args: String,
}

type ToolCallAssembly = HashMap<u64, PendingCall>;

/// Translate one streaming chunk into stream events. Tool calls are
/// finalised in wire-index order when the finish_reason arrives.
fn parse_stream_payload(
    payload: &str,
    assembly: &mut ToolCallAssembly,
) -> Vec<Result<StreamEvent>> {
    if payload.trim() == "[DONE]" {
        return Vec::new();
    }

    let chunk: WireCompletion = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        // Usage-only trailer (stream_options.include_usage).
        return match chunk.usage {
            Some(usage) => vec![Ok(StreamEvent::Done {
                usage: Some(usage.into()),
                finish_reason: None,
            })],
            None => Vec::new(),
        };
    };

    let mut events = Vec::new();

    for tc in choice.delta.unwrap_or_default().into_events(assembly) {
        events.push(Ok(tc));
    }

    if let Some(reason) = choice.finish_reason {
        let mut finished: Vec<(u64, PendingCall)> = assembly.drain().collect();
        finished.sort_by_key(|(index, _)| *index);
        for (_, call) in finished {
            let arguments = decode_arguments(&call.args, Some(&call.id));
            events.push(Ok(StreamEvent::ToolCallFinished {
                call_id: call.id,
                tool_name: call.name,
                arguments,
            }));
        }

        events.push(Ok(StreamEvent::Done {
            usage: chunk.usage.map(Into::into),
            finish_reason: Some(reason),
        }));
    }

    events
}

impl WireDelta {
    /// Turn one delta into its stream events, updating the assembly.
    fn into_events(self, assembly: &mut ToolCallAssembly) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(text) = self.reasoning_content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::Reasoning { text });
        }
        if let Some(text) = self.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::Token { text });
        }

        for tc in self.tool_calls {
            if let Some(id) = tc.id {
                let name = tc.function.name.clone().unwrap_or_default();
                events.push(StreamEvent::ToolCallStarted {
                    call_id: id.clone(),
                    tool_name: name.clone(),
                });
                assembly.insert(
                    tc.index,
                    PendingCall {
                        id,
                        name,
                        args: String::new(),
                    },
                );
            }

            if let Some(args) = tc.function.arguments.filter(|a| !a.is_empty()) {
                if let Some(pending) = assembly.get_mut(&tc.index) {
                    pending.args.push_str(&args);
                    events.push(StreamEvent::ToolCallDelta {
                        call_id: pending.id.clone(),
                        delta: args,
                    });
                }
            }
        }

        events
    }
}
