//! `multiedit` — apply a sequence of exact-string replacements to a single
//! file, each applied to the output of the previous one, all or nothing.

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;
use std::path::Path;

use crate::path::validate_path;
use crate::registry::Tool;

pub struct MultiEditTool;

#[async_trait]
impl Tool for MultiEditTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "multiedit",
                "Apply multiple sequential exact-string edits to a single file atomically.",
                ToolCategory::Filesystem,
                vec![
                    ToolParameter::required("path", ParameterType::String, "path to the file, relative to the workspace root"),
                    ToolParameter::required(
                        "edits",
                        ParameterType::Array,
                        "ordered list of {old_string, new_string} objects, each applied to the result of the previous edit",
                    ),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let path = params["path"].as_str().unwrap_or_default();
        let edits = params["edits"].as_array().cloned().unwrap_or_default();
        if edits.is_empty() {
            return Err(Error::tool_invalid_params("edits must be a non-empty array"));
        }

        let resolved = validate_path(Path::new(&ctx.working_directory), path)?;
        let mut content = tokio::fs::read_to_string(&resolved).await?;
        let mut applied = 0;

        for (i, edit) in edits.iter().enumerate() {
            let old_string = edit["old_string"].as_str().ok_or_else(|| {
                Error::new(ErrorCode::ToolInvalidParams, format!("edits[{i}].old_string must be a string"))
            })?;
            let new_string = edit["new_string"].as_str().ok_or_else(|| {
                Error::new(ErrorCode::ToolInvalidParams, format!("edits[{i}].new_string must be a string"))
            })?;
            if !content.contains(old_string) {
                return Err(Error::new(
                    ErrorCode::ValidationError,
                    format!("edits[{i}].old_string not found in '{path}' (after {applied} prior edit(s))"),
                ));
            }
            content = content.replacen(old_string, new_string, 1);
            applied += 1;
        }

        tokio::fs::write(&resolved, &content).await?;

        Ok(ExecutionResult::ok(
            format!("applied {applied} edit(s) to {path}"),
            started.elapsed().as_millis() as u64,
        )
        .with_metadata(serde_json::json!({ "path": path, "edits_applied": applied })))
    }
}
