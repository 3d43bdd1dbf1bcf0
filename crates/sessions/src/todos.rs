//! Session-scoped todo lists, persisted as a single JSON file keyed by
//! session id (todos are few and short-lived; a JSONL transcript would be
//! overkill).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chatcore_domain::error::{Error, Result};
use chatcore_domain::todo::{Todo, TodoStatus};
use parking_lot::RwLock;

pub struct Todos {
    path: PathBuf,
    by_session: RwLock<HashMap<String, Vec<Todo>>>,
}

impl Todos {
    pub fn new(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("todos.json");
        let by_session = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            by_session: RwLock::new(by_session),
        })
    }

    pub fn add(&self, session_id: &str, content: impl Into<String>) -> Result<Todo> {
        let todo = Todo::new(uuid::Uuid::new_v4().to_string(), session_id, content);
        let mut by_session = self.by_session.write();
        by_session.entry(session_id.to_owned()).or_default().push(todo.clone());
        drop(by_session);
        self.flush()?;
        Ok(todo)
    }

    pub fn list(&self, session_id: &str, status: Option<TodoStatus>) -> Vec<Todo> {
        self.by_session
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| status.map(|want| t.status == want).unwrap_or(true))
            .collect()
    }

    /// All todos across every session, newest-first. Used for the global
    /// (session-less) todo view.
    pub fn list_all(&self, status: Option<TodoStatus>) -> Vec<Todo> {
        let mut todos: Vec<Todo> = self
            .by_session
            .read()
            .values()
            .flatten()
            .cloned()
            .filter(|t| status.map(|want| t.status == want).unwrap_or(true))
            .collect();
        todos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        todos
    }

    pub fn update_status(&self, session_id: &str, todo_id: &str, status: TodoStatus) -> Result<Todo> {
        let mut by_session = self.by_session.write();
        let list = by_session
            .get_mut(session_id)
            .ok_or_else(|| Error::new(chatcore_domain::error::ErrorCode::NotFound, "session has no todos"))?;
        let todo = list
            .iter_mut()
            .find(|t| t.id == todo_id)
            .ok_or_else(|| Error::new(chatcore_domain::error::ErrorCode::NotFound, format!("todo not found: {todo_id}")))?;
        if status == TodoStatus::Completed {
            todo.complete();
        } else {
            todo.status = status;
            todo.updated_at = chrono::Utc::now();
        }
        let out = todo.clone();
        drop(by_session);
        self.flush()?;
        Ok(out)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.by_session.write().remove(session_id);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let by_session = self.by_session.read();
        let json = serde_json::to_string_pretty(&*by_session)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
