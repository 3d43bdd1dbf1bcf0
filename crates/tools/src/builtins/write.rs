//! `write` — create or overwrite a file, atomically (write to a `.tmp`
//! sibling, then rename into place), grounded in the teacher's
//! `file_ops::file_write`.

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::path::validate_path;
use crate::registry::Tool;

pub struct WriteTool;

#[async_trait]
impl Tool for WriteTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "write",
                "Create a file or overwrite it with the given content.",
                ToolCategory::Filesystem,
                vec![
                    ToolParameter::required("path", ParameterType::String, "path to the file, relative to the workspace root"),
                    ToolParameter::required("content", ParameterType::String, "full content to write"),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let path = params["path"].as_str().unwrap_or_default();
        let content = params["content"].as_str().unwrap_or_default();
        let resolved = validate_path(Path::new(&ctx.working_directory), path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_name = format!(
            ".{}.{}.tmp",
            resolved.file_name().unwrap_or_default().to_string_lossy(),
            uuid::Uuid::new_v4().as_simple()
        );
        let tmp_path = resolved.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &resolved).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(
            ExecutionResult::ok(format!("wrote {} bytes to {path}", content.len()), started.elapsed().as_millis() as u64)
                .with_metadata(serde_json::json!({ "path": path, "bytes_written": content.len() })),
        )
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
    async fn writes_nested_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriteTool
            .execute(serde_json::json!({"path": "sub/new.txt", "content": "hello"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.success);
        let written = std::fs::read_to_string(dir.path().join("sub/new.txt")).unwrap();
        assert_eq!(written, "hello");
    }
}
