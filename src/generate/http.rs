//! OpenAI-compatible streaming chat-completions transport.
//!
//! One `stream_turn` call issues one `POST {base}/chat/completions` with
//! `stream: true` and pumps the SSE body into [`GenChunk`]s. Providers stream
//! tool calls as partial deltas keyed by an item index; those are accumulated
//! here so the seam only ever surfaces complete function-call requests.

use super::{FunctionCallRequest, GenChunk, GenChunkReceiver, GenerationClient, SseFrameDecoder};
use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::types::{ContentUnit, Role, ToolDeclaration, ToolOutcome, Transcript};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Production planning-model client.
pub struct HttpGenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: Option<f64>,
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
        })
    }

    fn request_payload(&self, transcript: &Transcript, tools: &[ToolDeclaration]) -> Value {
        let mut messages = Vec::new();
        if !self.system_prompt.trim().is_empty() {
            messages.push(json!({"role": "system", "content": self.system_prompt}));
        }
        messages.extend(provider_messages(transcript));

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            let declared: Vec<Value> = tools.iter().map(declared_tool).collect();
            payload["tools"] = Value::Array(declared);
        }
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }
        payload
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn stream_turn(
        &self,
        transcript: Transcript,
        tools: Vec<ToolDeclaration>,
    ) -> Result<GenChunkReceiver, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.request_payload(&transcript, &tools);

        let mut request = self.http.post(&url).json(&payload);
        if !self.api_key.trim().is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        tracing::debug!(
            model = %self.model,
            turns = transcript.len(),
            tools = tools.len(),
            "starting generation turn"
        );
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status(status, body));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_body(response, tx));
        Ok(rx)
    }
}

/// Drain the SSE body into chunk messages until `[DONE]` or transport error.
async fn pump_body(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<Result<GenChunk, GenerationError>>,
) {
    let mut decoder = SseFrameDecoder::new();
    let mut pending = PendingCalls::default();
    let mut body = response.bytes_stream();
    let mut done = false;

    while !done {
        let Some(piece) = body.next().await else {
            break;
        };
        let bytes = match piece {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = tx.send(Err(GenerationError::Http(err)));
                return;
            }
        };
        for payload in decoder.feed(&bytes) {
            if payload == "[DONE]" {
                done = true;
                break;
            }
            if let Err(err) = consume_payload(&payload, &mut pending, &tx) {
                let _ = tx.send(Err(err));
                return;
            }
        }
    }

    if !done {
        if let Some(payload) = decoder.finish() {
            if payload != "[DONE]" {
                if let Err(err) = consume_payload(&payload, &mut pending, &tx) {
                    let _ = tx.send(Err(err));
                    return;
                }
            }
        }
    }

    for call in pending.drain() {
        let _ = tx.send(Ok(GenChunk {
            text: None,
            call: Some(call),
        }));
    }
}

/// Fold one streaming payload into outgoing chunks and pending call state.
fn consume_payload(
    payload: &str,
    pending: &mut PendingCalls,
    tx: &mpsc::UnboundedSender<Result<GenChunk, GenerationError>>,
) -> Result<(), GenerationError> {
    let frame: Value = serde_json::from_str(payload)
        .map_err(|err| GenerationError::Stream(format!("invalid streaming payload: {err}")))?;
    let Some(delta) = frame
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
    else {
        return Ok(());
    };

    if let Some(text) = delta.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            let _ = tx.send(Ok(GenChunk::text(text)));
        }
    }

    if let Some(items) = delta.get("tool_calls").and_then(Value::as_array) {
        for item in items {
            for call in pending.absorb(item) {
                let _ = tx.send(Ok(GenChunk {
                    text: None,
                    call: Some(call),
                }));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Partial tool-call accumulation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    arguments: String,
}

/// Partial tool-call deltas keyed by the provider's per-message item index.
///
/// Providers emit call items strictly in index order, so the arrival of a
/// higher index proves every lower-indexed call is complete.
#[derive(Debug, Default)]
struct PendingCalls {
    by_index: BTreeMap<u64, PendingCall>,
}

impl PendingCalls {
    /// Absorb one `tool_calls` delta item; returns calls it proved complete.
    fn absorb(&mut self, item: &Value) -> Vec<FunctionCallRequest> {
        let index = item.get("index").and_then(Value::as_u64).unwrap_or(0);

        let finished_keys: Vec<u64> = self
            .by_index
            .keys()
            .copied()
            .filter(|key| *key < index)
            .collect();
        let mut completed = Vec::new();
        for key in finished_keys {
            if let Some(call) = self.by_index.remove(&key) {
                completed.push(call.into_request());
            }
        }

        let slot = self.by_index.entry(index).or_default();
        if let Some(function) = item.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                slot.name.push_str(name);
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                slot.arguments.push_str(arguments);
            }
        }
        completed
    }

    /// Flush every remaining call in index order at end of turn.
    fn drain(&mut self) -> Vec<FunctionCallRequest> {
        std::mem::take(&mut self.by_index)
            .into_values()
            .map(PendingCall::into_request)
            .collect()
    }
}

impl PendingCall {
    fn into_request(self) -> FunctionCallRequest {
        FunctionCallRequest {
            name: self.name,
            arguments: if self.arguments.is_empty() {
                "{}".to_string()
            } else {
                self.arguments
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Transcript -> provider messages
// ---------------------------------------------------------------------------

/// Wrap one declaration in the provider's function-tool envelope.
fn declared_tool(tool: &ToolDeclaration) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Map the transcript onto provider chat messages.
///
/// Tool results become individual `role:"tool"` messages in request order;
/// remaining human content aggregates into one user message (a content-part
/// array when images are present). Agent turns carry their requests as
/// `tool_calls` next to any text.
fn provider_messages(transcript: &Transcript) -> Vec<Value> {
    let mut messages = Vec::new();
    for turn in transcript.turns() {
        match turn.role {
            Role::Human => append_human_turn(turn.content.as_slice(), &mut messages),
            Role::Agent => append_agent_turn(turn.content.as_slice(), &mut messages),
        }
    }
    messages
}

fn append_human_turn(content: &[ContentUnit], messages: &mut Vec<Value>) {
    let mut parts = Vec::new();
    let mut has_image = false;
    let mut plain_text = Vec::new();

    for unit in content {
        match unit {
            ContentUnit::Text { text } => {
                plain_text.push(text.as_str());
                parts.push(json!({"type": "text", "text": text}));
            }
            ContentUnit::InlineImage { mime, data } => {
                has_image = true;
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:{mime};base64,{data}")}
                }));
            }
            ContentUnit::ToolResult { id, outcome, .. } => {
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": rendered_outcome(outcome),
                }));
            }
            // Tool requests never appear in human turns; skip defensively-typed input.
            ContentUnit::ToolRequest { .. } => {}
        }
    }

    if parts.is_empty() {
        return;
    }
    let content = if has_image {
        Value::Array(parts)
    } else {
        Value::String(plain_text.join("\n"))
    };
    messages.push(json!({"role": "user", "content": content}));
}

fn append_agent_turn(content: &[ContentUnit], messages: &mut Vec<Value>) {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();

    for unit in content {
        match unit {
            ContentUnit::Text { text: t } => text.push(t.as_str()),
            ContentUnit::ToolRequest {
                id,
                name,
                arguments,
            } => {
                let serialized =
                    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_string());
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": serialized},
                }));
            }
            _ => {}
        }
    }

    if text.is_empty() && tool_calls.is_empty() {
        return;
    }
    let mut message = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { Value::String(text.join("\n")) },
    });
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }
    messages.push(message);
}

/// Provider-facing rendering of one tool outcome.
fn rendered_outcome(outcome: &ToolOutcome) -> Value {
    match outcome {
        ToolOutcome::Text { text } => Value::String(text.clone()),
        ToolOutcome::Error { message } => Value::String(format!("ERROR: {message}")),
        ToolOutcome::Image { data, .. } => json!([{
            "type": "image_url",
            "image_url": {"url": format!("data:image/png;base64,{data}")}
        }]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
