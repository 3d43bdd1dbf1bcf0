//! `webfetch` — fetch a URL and return its body as text, truncated to a
//! byte cap. Performs the fetch whenever `reqwest` can reach the network;
//! unlike the teacher's permanent stub tools, this one is live.

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;

use crate::registry::Tool;

const DEFAULT_MAX_BYTES: usize = 65_536;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("chatcore-agent/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client build is infallible with default config");
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "webfetch",
                "Fetch a URL and return the response body as UTF-8 text, truncated to max_bytes.",
                ToolCategory::Intelligence,
                vec![
                    ToolParameter::required("url", ParameterType::String, "the URL to fetch"),
                    ToolParameter::optional("max_bytes", ParameterType::Number, "maximum response bytes to return", serde_json::json!(DEFAULT_MAX_BYTES)),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let url = params["url"].as_str().unwrap_or_default();
        let max_bytes = params.get("max_bytes").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MAX_BYTES as u64) as usize;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::new(ErrorCode::ToolInvalidParams, "url must start with http:// or https://"));
        }

        let resp = self.client.get(url).send().await.map_err(|e| {
            Error::new(ErrorCode::NetworkError, format!("request to '{url}' failed: {e}"))
        })?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| Error::new(ErrorCode::NetworkError, e.to_string()))?;
        let truncated = bytes.len() > max_bytes;
        let slice = &bytes[..bytes.len().min(max_bytes)];
        let body = String::from_utf8_lossy(slice).into_owned();

        if !status.is_success() {
            return Ok(ExecutionResult::failed(
                format!("'{url}' returned status {status}"),
                started.elapsed().as_millis() as u64,
            ));
        }

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64)
            .with_metadata(serde_json::json!({ "status": status.as_u16(), "truncated": truncated })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: ".".into(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let tool = WebFetchTool::new();
        let result = tool.execute(serde_json::json!({"url": "file:///etc/passwd"}), &ctx()).await;
        assert!(result.is_err());
    }
}
