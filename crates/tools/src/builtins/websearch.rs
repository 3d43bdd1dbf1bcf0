//! `websearch` — query a configured search API, or return a structured stub
//! result when none is configured (grounded in the teacher's `stub_tool`
//! shape for tools with no backing provider, `gateway::runtime::tools`).
//! Unlike the teacher's permanent stub, this one performs the request when
//! `CHATCORE_SEARCH_API_KEY` is set.

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;

use crate::registry::Tool;

const DEFAULT_MAX_RESULTS: u64 = 5;
const SEARCH_API_KEY_ENV: &str = "CHATCORE_SEARCH_API_KEY";
const SEARCH_API_URL_ENV: &str = "CHATCORE_SEARCH_API_URL";

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "websearch",
                "Search the web for a query and return a list of results.",
                ToolCategory::Intelligence,
                vec![
                    ToolParameter::required("query", ParameterType::String, "search query"),
                    ToolParameter::optional("max_results", ParameterType::Number, "maximum number of results to return", serde_json::json!(DEFAULT_MAX_RESULTS)),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let query = params["query"].as_str().unwrap_or_default();
        let max_results = params.get("max_results").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MAX_RESULTS);

        let (Ok(api_key), Ok(api_url)) = (std::env::var(SEARCH_API_KEY_ENV), std::env::var(SEARCH_API_URL_ENV)) else {
            return Ok(ExecutionResult::failed(
                "websearch is not configured: set CHATCORE_SEARCH_API_KEY and CHATCORE_SEARCH_API_URL to enable it. Use the bash tool with curl as a workaround.",
                started.elapsed().as_millis() as u64,
            ));
        };

        let resp = self
            .client
            .get(&api_url)
            .bearer_auth(api_key)
            .query(&[("q", query), ("limit", &max_results.to_string())])
            .send()
            .await;

        let body = match resp {
            Ok(r) => r.text().await.unwrap_or_default(),
            Err(e) => {
                return Ok(ExecutionResult::failed(
                    format!("search request failed: {e}"),
                    started.elapsed().as_millis() as u64,
                ))
            }
        };

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_result_when_unconfigured() {
        std::env::remove_var(SEARCH_API_KEY_ENV);
        std::env::remove_var(SEARCH_API_URL_ENV);
        let ctx = ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: ".".into(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = WebSearchTool::new().execute(serde_json::json!({"query": "rust async"}), &ctx).await.unwrap();
        assert!(!result.success);
    }
}
