//! `glob` — fast file pattern matching across the workspace, gitignore-aware.
//!
//! Grounded in the pack's `ignore` + `glob` crate pairing (enrich from the
//! pack: the teacher doesn't ship a glob tool).

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use glob::Pattern;
use ignore::WalkBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::path::validate_path;
use crate::registry::Tool;

const MAX_RESULTS: usize = 500;

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "glob",
                "Fast file pattern matching tool that works with any codebase size.",
                ToolCategory::Search,
                vec![
                    ToolParameter::required("pattern", ParameterType::String, "glob pattern to match, e.g. '**/*.rs'"),
                    ToolParameter::optional("path", ParameterType::String, "directory to search from, relative to the workspace root", serde_json::json!(".")),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let pattern_str = params["pattern"].as_str().unwrap_or_default();
        let path = params.get("path").and_then(|v| v.as_str()).unwrap_or(".");

        let pattern = Pattern::new(pattern_str).map_err(|e| Error::new(ErrorCode::ToolInvalidParams, format!("invalid glob pattern: {e}")))?;
        let root = validate_path(Path::new(&ctx.working_directory), path)?;

        let mut matches: Vec<PathBuf> = Vec::new();
        let mut truncated = false;
        for entry in WalkBuilder::new(&root).hidden(false).git_ignore(true).build() {
            if matches.len() >= MAX_RESULTS {
                truncated = true;
                break;
            }
            let entry = entry.map_err(|e| Error::new(ErrorCode::InternalError, format!("walk error: {e}")))?;
            if entry.file_type().map(|t| !t.is_file()).unwrap_or(true) {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if pattern.matches_path(relative) {
                matches.push(relative.to_path_buf());
            }
        }

        matches.sort_by_key(|p| {
            std::fs::metadata(root.join(p))
                .and_then(|m| m.modified())
                .ok()
                .map(std::cmp::Reverse)
        });

        let body = matches.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("\n");

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64)
            .with_metadata(serde_json::json!({ "count": matches.len(), "truncated": truncated })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_nested_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let ctx = ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: dir.path().display().to_string(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = GlobTool.execute(serde_json::json!({"pattern": "**/*.rs"}), &ctx).await.unwrap();
        assert!(result.output.contains("lib.rs"));
        assert!(!result.output.contains("readme.md"));
    }
}
