// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Non-streaming client for OpenAI-compatible chat completion APIs.
//!
//! Any endpoint that speaks the `/chat/completions` wire format works here —
//! the hosted OpenAI API, local servers, and gateway proxies alike.  The
//! decision loop consumes whole responses, so requests are sent with
//! `stream: false` and the single JSON body is parsed directly.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{Completion, CompletionRequest, Role, ToolCallRequest, Usage};

/// OpenAI-compatible chat completion provider.
pub struct OpenAICompatProvider {
    /// Model id forwarded to the API.
    model: String,
    /// API key; `None` for local servers that accept unauthenticated requests.
    api_key: Option<String>,
    /// Full chat completions URL.
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    /// Construct a provider.
    ///
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let messages = build_openai_messages(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(format) = &req.response_format {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "schema": format.schema,
                    "strict": true,
                }
            });
        }

        debug!(
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending completion request"
        );

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await.context("completion request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("provider error {status}: {text}");
        }

        let v: Value = resp.json().await.context("reading completion body")?;
        parse_completion_body(&v)
    }
}

/// Parse a non-streaming `/chat/completions` response body.
fn parse_completion_body(v: &Value) -> anyhow::Result<Completion> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        bail!("provider response has no choices: {v}");
    }

    let text = message["content"].as_str().unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let name = match call["function"]["name"].as_str() {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    warn!("dropping tool call with empty name from model");
                    continue;
                }
            };
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("");
            // Always resolve to a JSON object so dispatch never sees `null`
            // or invalid JSON.
            let args = if raw_args.is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(raw_args).unwrap_or_else(|e| {
                    warn!(tool = %name, error = %e, "invalid tool arguments; substituting {{}}");
                    Value::Object(Default::default())
                })
            };
            tool_calls.push(ToolCallRequest { id, name, args });
        }
    }

    let usage = Usage {
        input_tokens: v["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: v["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(Completion {
        text,
        tool_calls,
        usage,
    })
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Serialize the message history into the OpenAI wire format.
///
/// Consecutive `ToolCall` messages merge into a single assistant message so
/// the wire format satisfies the parallel-tool-call contract.
pub(crate) fn build_openai_messages(messages: &[crate::Message]) -> Vec<Value> {
    use crate::{ContentPart, MessageContent};

    fn tool_call_to_json(tool_call_id: &str, function: &crate::FunctionCall) -> Value {
        json!({
            "id": tool_call_id,
            "type": "function",
            "function": {
                "name": function.name,
                "arguments": function.arguments,
            }
        })
    }

    let mut result: Vec<Value> = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let m = &messages[i];

        if let MessageContent::ToolCall {
            tool_call_id,
            function,
        } = &m.content
        {
            let mut calls = vec![tool_call_to_json(tool_call_id, function)];
            i += 1;
            while i < messages.len() {
                if let MessageContent::ToolCall {
                    tool_call_id,
                    function,
                } = &messages[i].content
                {
                    calls.push(tool_call_to_json(tool_call_id, function));
                    i += 1;
                } else {
                    break;
                }
            }
            result.push(json!({ "role": "assistant", "tool_calls": calls }));
            continue;
        }

        let v = match &m.content {
            MessageContent::Text(t) => json!({
                "role": role_str(&m.role),
                "content": t,
            }),
            MessageContent::ContentParts(parts) if !parts.is_empty() => {
                let content: Vec<Value> = parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                        ContentPart::Image { image_url } => json!({
                            "type": "image_url",
                            "image_url": { "url": image_url },
                        }),
                    })
                    .collect();
                json!({ "role": role_str(&m.role), "content": content })
            }
            MessageContent::ContentParts(_) => {
                json!({ "role": role_str(&m.role), "content": "" })
            }
            MessageContent::ToolCall { .. } => unreachable!("handled above"),
            MessageContent::ToolResult {
                tool_call_id,
                content,
            } => {
                json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content })
            }
        };
        result.push(v);
        i += 1;
    }

    result
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
