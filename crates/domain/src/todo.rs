//! Session-scoped todo items, managed by the `todo` tool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub status: TodoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id: session_id.into(),
            content: content.into(),
            status: TodoStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(&mut self) {
        self.status = TodoStatus::Completed;
        self.updated_at = Utc::now();
    }
}
