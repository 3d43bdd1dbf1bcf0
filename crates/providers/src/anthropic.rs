//! Anthropic-native adapter.
//!
//! Speaks the Messages API directly: system prompt goes in a top-level
//! `system` field, tool calls come back as `tool_use` content blocks, and
//! tool results are sent back as `user` messages carrying `tool_result`
//! blocks.

use async_trait::async_trait;
use serde_json::Value;

use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::message::{Message, Role, ToolCall};
use chatcore_domain::tool::ToolDefinition;

use crate::traits::{AssistantMessage, ChatOptions, ProviderAdapter};
use crate::util::{error_for_status, from_reqwest};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    models: Vec<String>,
    client: reqwest::Client,
    /// System-prompt fingerprint -> provider cache id. Written, never read
    /// for correctness (`spec.md` §4.5): a hint only.
    cache_hints: parking_lot_free::FingerprintCache,
}

/// A tiny `Mutex<HashMap<...>>` wrapper so we don't pull in `parking_lot`
/// here just for a write-mostly hint cache.
mod parking_lot_free {
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FingerprintCache(Mutex<HashMap<String, String>>);

    impl FingerprintCache {
        pub fn record(&self, fingerprint: String, cache_id: String) {
            self.0.lock().unwrap().insert(fingerprint, cache_id);
        }
    }
}

impl AnthropicProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: String, default_model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("reqwest client build is infallible with default config");
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key,
            models: vec![default_model.clone()],
            default_model,
            client,
            cache_hints: Default::default(),
        }
    }

    fn authed_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
    }

    fn build_body(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let model = options.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut system_parts = Vec::new();
        let mut api_messages = Vec::new();
        for m in messages {
            match m.role {
                Role::System => system_parts.push(m.content.clone()),
                Role::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": m.content,
                })),
                Role::Assistant => api_messages.push(assistant_to_anthropic(m)),
                Role::Tool => api_messages.push(tool_result_to_anthropic(m)),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": 8192,
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if !options.tools.is_empty() {
            let tools: Vec<Value> = options.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    fn fingerprint(system_prompt: &str) -> String {
        // Cheap, deterministic fingerprint — not a security boundary, just
        // a cache key hint passed along to the provider.
        format!("{:x}", md5_like(system_prompt))
    }
}

/// Minimal non-cryptographic hash so we don't pull in an md5 dependency for
/// a cache hint nobody reads back for correctness.
fn md5_like(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn assistant_to_anthropic(m: &Message) -> Value {
    let mut content = Vec::new();
    if !m.content.is_empty() {
        content.push(serde_json::json!({"type": "text", "text": m.content}));
    }
    if let Some(calls) = &m.tool_calls {
        for call in calls {
            content.push(serde_json::json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }));
        }
    }
    serde_json::json!({"role": "assistant", "content": content})
}

fn tool_result_to_anthropic(m: &Message) -> Value {
    serde_json::json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
            "content": m.content,
        }],
    })
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &tool.parameters {
        properties.insert(
            p.name.clone(),
            serde_json::json!({
                "type": param_type_name(p.param_type),
                "description": p.description,
            }),
        );
        if p.required {
            required.push(p.name.clone());
        }
    }
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": {
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        },
    })
}

fn param_type_name(t: chatcore_domain::tool::ParameterType) -> &'static str {
    use chatcore_domain::tool::ParameterType::*;
    match t {
        String => "string",
        Number => "number",
        Boolean => "boolean",
        Array => "array",
        Object => "object",
    }
}

fn parse_response(body: &Value) -> Result<AssistantMessage> {
    let blocks = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &blocks {
        match block.get("type").and_then(|v| v.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    name: block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    input: block.get("input").cloned().unwrap_or(Value::Object(Default::default())),
                });
            }
            _ => {}
        }
    }
    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let (input_tokens, output_tokens) = body
        .get("usage")
        .map(|u| {
            (
                u.get("input_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
                u.get("output_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
            )
        })
        .unwrap_or((None, None));

    Ok(AssistantMessage {
        content: text,
        tool_calls,
        model,
        input_tokens,
        output_tokens,
    })
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        &self.id
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<AssistantMessage> {
        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            self.cache_hints.record(Self::fingerprint(&system.content), self.id.clone());
        }

        let body = self.build_body(messages, options);
        let resp = self
            .authed_post("/v1/messages")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(error_for_status(status, &text));
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| Error::new(ErrorCode::LlmApiError, format!("malformed response: {e}")))?;
        parse_response(&json)
    }
}
