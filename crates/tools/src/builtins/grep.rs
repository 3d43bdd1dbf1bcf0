//! `grep` — regex search over workspace files, gitignore-aware.
//!
//! Grounded in the pack's `ignore`-crate walking pattern (enrich from the
//! pack: the teacher doesn't ship a search tool) paired with `regex` for
//! matching, which the rest of the workspace already depends on.

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use ignore::WalkBuilder;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::path::validate_path;
use crate::registry::Tool;

const MAX_MATCHES: usize = 200;

#[derive(Serialize)]
struct Match {
    path: String,
    line: u64,
    text: String,
}

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "grep",
                "Search workspace files for lines matching a regular expression.",
                ToolCategory::Search,
                vec![
                    ToolParameter::required("pattern", ParameterType::String, "regular expression to search for"),
                    ToolParameter::optional("path", ParameterType::String, "directory to search, relative to the workspace root", serde_json::json!(".")),
                    ToolParameter::optional("include", ParameterType::String, "glob restricting which filenames are searched, e.g. '*.rs'", Value::Null),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let pattern = params["pattern"].as_str().unwrap_or_default();
        let path = params.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = params.get("include").and_then(|v| v.as_str()).map(|s| s.to_string());

        let regex = Regex::new(pattern).map_err(|e| Error::new(ErrorCode::ToolInvalidParams, format!("invalid pattern: {e}")))?;
        let root = validate_path(Path::new(&ctx.working_directory), path)?;
        let include_glob = include
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| Error::new(ErrorCode::ToolInvalidParams, format!("invalid include glob: {e}")))?;

        let mut matches = Vec::new();
        let mut files_searched = 0usize;
        let mut truncated = false;

        for entry in WalkBuilder::new(&root).hidden(false).git_ignore(true).build() {
            if matches.len() >= MAX_MATCHES {
                truncated = true;
                break;
            }
            let entry = entry.map_err(|e| Error::new(ErrorCode::InternalError, format!("walk error: {e}")))?;
            if entry.file_type().map(|t| !t.is_file()).unwrap_or(true) {
                continue;
            }
            if let Some(glob) = &include_glob {
                if !glob.matches_path(entry.path().file_name().map(Path::new).unwrap_or(Path::new(""))) {
                    continue;
                }
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            files_searched += 1;
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(Match {
                        path: relative.display().to_string(),
                        line: (i + 1) as u64,
                        text: line.to_string(),
                    });
                    if matches.len() >= MAX_MATCHES {
                        truncated = true;
                        break;
                    }
                }
            }
        }

        let body = matches
            .iter()
            .map(|m| format!("{}:{}:{}", m.path, m.line, m.text))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64).with_metadata(serde_json::json!({
            "matches": matches.len(),
            "files_searched": files_searched,
            "truncated": truncated,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nfn helper() {}\n").unwrap();
        let ctx = ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: dir.path().display().to_string(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = GrepTool.execute(serde_json::json!({"pattern": "fn \\w+"}), &ctx).await.unwrap();
        assert!(result.output.contains("a.rs:1:"));
        assert!(result.output.contains("a.rs:2:"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: dir.path().display().to_string(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = GrepTool.execute(serde_json::json!({"pattern": "("}), &ctx).await;
        assert!(result.is_err());
    }
}
