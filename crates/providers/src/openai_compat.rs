//! OpenAI-compatible chat-completions adapter. Covers any provider that
//! speaks the `/chat/completions` wire format with a `tools`/`tool_calls`
//! function-calling shape (OpenAI itself, and most self-hosted gateways).

use async_trait::async_trait;
use serde_json::Value;

use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::message::{Message, Role, ToolCall};
use chatcore_domain::tool::ToolDefinition;

use crate::traits::{AssistantMessage, ChatOptions, ProviderAdapter};
use crate::util::{error_for_status, from_reqwest};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    models: Vec<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
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
        }
    }

    fn build_body(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let model = options.model.clone().unwrap_or_else(|| self.default_model.clone());
        let api_messages: Vec<Value> = messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
        });
        if !options.tools.is_empty() {
            let tools: Vec<Value> = options.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

fn message_to_openai(m: &Message) -> Value {
    match m.role {
        Role::System => serde_json::json!({"role": "system", "content": m.content}),
        Role::User => serde_json::json!({"role": "user", "content": m.content}),
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
            "content": m.content,
        }),
        Role::Assistant => {
            let mut v = serde_json::json!({"role": "assistant", "content": m.content});
            if let Some(calls) = &m.tool_calls {
                let tool_calls: Vec<Value> = calls
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.input.to_string()},
                        })
                    })
                    .collect();
                v["tool_calls"] = Value::Array(tool_calls);
            }
            v
        }
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &tool.parameters {
        properties.insert(
            p.name.clone(),
            serde_json::json!({"type": param_type_name(p.param_type), "description": p.description}),
        );
        if p.required {
            required.push(p.name.clone());
        }
    }
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": {
                "type": "object",
                "properties": Value::Object(properties),
                "required": required,
            },
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
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| Error::new(ErrorCode::LlmApiError, "response has no choices"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| Error::new(ErrorCode::LlmApiError, "choice has no message"))?;

    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let func = tc.get("function")?;
                    let args_str = func.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                    let input: Value = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
                    Some(ToolCall {
                        id: tc.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        name: func.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        input,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let (input_tokens, output_tokens) = body
        .get("usage")
        .map(|u| {
            (
                u.get("prompt_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
                u.get("completion_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
            )
        })
        .unwrap_or((None, None));

    Ok(AssistantMessage {
        content,
        tool_calls,
        model,
        input_tokens,
        output_tokens,
    })
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.id
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<AssistantMessage> {
        let body = self.build_body(messages, options);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
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
