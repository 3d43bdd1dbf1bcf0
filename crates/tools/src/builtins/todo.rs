//! `todo` — manage the session's todo list via the Session Store.

use std::sync::Arc;

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::todo::TodoStatus;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use chatcore_sessions::SessionStore;
use serde_json::Value;

use crate::registry::Tool;

pub struct TodoTool {
    store: Arc<SessionStore>,
}

impl TodoTool {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "todo",
                "Add, list, or complete items on the current session's todo list.",
                ToolCategory::Management,
                vec![
                    ToolParameter::required("action", ParameterType::String, "one of 'add', 'list', 'complete'"),
                    ToolParameter::optional("content", ParameterType::String, "todo text, required for action=add", Value::Null),
                    ToolParameter::optional("todo_id", ParameterType::String, "todo id, required for action=complete", Value::Null),
                ],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let action = params["action"].as_str().unwrap_or_default();

        let body = match action {
            "add" => {
                let content = params.get("content").and_then(|v| v.as_str()).ok_or_else(|| {
                    Error::tool_invalid_params("action=add requires 'content'")
                })?;
                let todo = self.store.add_todo(&ctx.session_id, content)?;
                serde_json::to_string(&todo)?
            }
            "list" => {
                let todos = self.store.list_todos(Some(&ctx.session_id), None)?;
                serde_json::to_string(&todos)?
            }
            "complete" => {
                let todo_id = params.get("todo_id").and_then(|v| v.as_str()).ok_or_else(|| {
                    Error::tool_invalid_params("action=complete requires 'todo_id'")
                })?;
                let todo = self.store.update_todo_status(&ctx.session_id, todo_id, TodoStatus::Completed)?;
                serde_json::to_string(&todo)?
            }
            other => {
                return Err(Error::new(
                    ErrorCode::ToolInvalidParams,
                    format!("unknown todo action '{other}', expected 'add', 'list', or 'complete'"),
                ));
            }
        };

        Ok(ExecutionResult::ok(body, started.elapsed().as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()).unwrap());
        let session = store.create_session(None).unwrap();
        let tool = TodoTool::new(store);
        let ctx = ExecutionContext {
            session_id: session.id.clone(),
            user_id: None,
            working_directory: ".".into(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };

        tool.execute(serde_json::json!({"action": "add", "content": "write tests"}), &ctx).await.unwrap();
        let listed = tool.execute(serde_json::json!({"action": "list"}), &ctx).await.unwrap();
        assert!(listed.output.contains("write tests"));
    }

    #[tokio::test]
    async fn unknown_action_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()).unwrap());
        let session = store.create_session(None).unwrap();
        let tool = TodoTool::new(store);
        let ctx = ExecutionContext {
            session_id: session.id,
            user_id: None,
            working_directory: ".".into(),
            timeout: std::time::Duration::from_secs(5),
            env: Default::default(),
        };
        let result = tool.execute(serde_json::json!({"action": "bogus"}), &ctx).await;
        assert!(result.is_err());
    }
}
