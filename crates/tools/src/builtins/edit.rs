//! `edit` — replace an exact string occurrence in a file.

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;
use std::path::Path;

use crate::path::validate_path;
use crate::registry::Tool;

pub struct EditTool;

#[async_trait]
impl Tool for EditTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "edit",
                "Replace an exact string occurrence in a file with another string.",
                ToolCategory::Filesystem,
                vec![
                    ToolParameter::required("path", ParameterType::String, "path to the file, relative to the workspace root"),
                    ToolParameter::required("old_string", ParameterType::String, "exact text to replace"),
                    ToolParameter::required("new_string", ParameterType::String, "replacement text"),
                    ToolParameter::optional("replace_all", ParameterType::Boolean, "replace every occurrence instead of requiring exactly one", serde_json::json!(false)),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let path = params["path"].as_str().unwrap_or_default();
        let old_string = params["old_string"].as_str().unwrap_or_default();
        let new_string = params["new_string"].as_str().unwrap_or_default();
        let replace_all = params.get("replace_all").and_then(|v| v.as_bool()).unwrap_or(false);

        let resolved = validate_path(Path::new(&ctx.working_directory), path)?;
        let content = tokio::fs::read_to_string(&resolved).await?;

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Err(Error::new(ErrorCode::ValidationError, format!("old_string not found in '{path}'")));
        }
        if !replace_all && occurrences > 1 {
            return Err(Error::new(
                ErrorCode::ValidationError,
                format!("old_string matched {occurrences} times in '{path}'; pass replace_all=true or narrow the match"),
            ));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        tokio::fs::write(&resolved, updated).await?;

        Ok(ExecutionResult::ok(
            format!("replaced {occurrences} occurrence(s) in {path}"),
            started.elapsed().as_millis() as u64,
        )
        .with_metadata(serde_json::json!({ "path": path, "occurrences": occurrences })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(root: &std::path::Path) -> ExecutionContext {
        ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: root.display().to_string(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn replaces_single_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        EditTool
            .execute(serde_json::json!({"path": "a.txt", "old_string": "world", "new_string": "there"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello there");
    }

    #[tokio::test]
    async fn ambiguous_match_requires_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();
        let result = EditTool
            .execute(serde_json::json!({"path": "a.txt", "old_string": "foo", "new_string": "bar"}), &ctx(dir.path()))
            .await;
        assert!(result.is_err());
    }
}
