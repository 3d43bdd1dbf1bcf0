//! `list` — list a directory's immediate entries.

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::path::validate_path;
use crate::registry::Tool;

#[derive(Serialize)]
struct Entry {
    name: String,
    is_dir: bool,
    size: u64,
}

pub struct ListTool;

#[async_trait]
impl Tool for ListTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "list",
                "List the immediate entries of a directory.",
                ToolCategory::Filesystem,
                vec![ToolParameter::optional(
                    "path",
                    ParameterType::String,
                    "directory to list, relative to the workspace root",
                    serde_json::json!("."),
                )],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let path = params.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = validate_path(Path::new(&ctx.working_directory), path)?;

        let mut read_dir = tokio::fs::read_dir(&resolved).await?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let body = entries
            .iter()
            .map(|e| if e.is_dir { format!("{}/", e.name) } else { e.name.clone() })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64)
            .with_metadata(serde_json::json!({ "path": path, "entries": entries, "count": entries.len() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_files_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let ctx = ExecutionContext {
            session_id: "s1".into(),
            user_id: None,
            working_directory: dir.path().display().to_string(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = ListTool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result.output, "a.txt\nb.txt\nsub/");
    }
}
