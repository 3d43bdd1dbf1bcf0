//! `read` — read a file's contents, optionally a line range.

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;
use std::path::Path;

use crate::path::validate_path;
use crate::registry::Tool;

pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "read",
                "Read a file's contents, optionally starting from a given line and limited to a number of lines.",
                ToolCategory::Filesystem,
                vec![
                    ToolParameter::required("path", ParameterType::String, "path to the file, relative to the workspace root"),
                    ToolParameter::optional("offset", ParameterType::Number, "0-indexed line to start from", serde_json::json!(0)),
                    ToolParameter::optional("limit", ParameterType::Number, "maximum number of lines to return", Value::Null),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let path = params["path"].as_str().unwrap_or_default();
        let resolved = validate_path(Path::new(&ctx.working_directory), path)?;

        let content = tokio::fs::read_to_string(&resolved).await?;
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let offset = params.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let limit = params
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(total_lines.saturating_sub(offset));

        let selected: Vec<&str> = lines.into_iter().skip(offset).take(limit).collect();
        let lines_returned = selected.len();
        let body = selected.join("\n");

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64).with_metadata(serde_json::json!({
            "path": path,
            "total_lines": total_lines,
            "offset": offset,
            "lines_returned": lines_returned,
        })))
    }
}
