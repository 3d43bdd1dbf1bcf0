//! Durable storage for sessions, their message transcripts, and todos.
//!
//! Backed by a JSON session index plus one append-only JSONL transcript
//! per session, the way a single gateway process owns its state on disk
//! with no external database.

mod store;
mod todos;
mod transcript;

pub use store::HealthReport;
pub use todos::Todos;
pub use transcript::Transcripts;

use std::path::Path;

use chatcore_domain::error::Result;
use chatcore_domain::message::{Message, NewMessage};
use chatcore_domain::session::{Session, SessionStatus, SessionUpdate};
use chatcore_domain::todo::{Todo, TodoStatus};
use store::SessionIndex;

/// The Session Store: every operation named in the session/message/todo
/// contract, backed by plain files under `state_dir`.
pub struct SessionStore {
    index: SessionIndex,
    transcripts: Transcripts,
    todos: Todos,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Result<Self> {
        Ok(Self {
            index: SessionIndex::new(state_dir)?,
            transcripts: Transcripts::new(&state_dir.join("transcripts"))?,
            todos: Todos::new(state_dir)?,
        })
    }

    pub fn create_session(&self, id: Option<String>) -> Result<Session> {
        self.index.create(id)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.index.get(id)
    }

    pub fn list_sessions(&self, limit: Option<usize>, offset: usize, status: Option<SessionStatus>) -> Vec<Session> {
        self.index.list(limit, offset, status)
    }

    pub fn update_session(&self, id: &str, patch: SessionUpdate) -> Result<Session> {
        self.index.update(id, patch)
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        // Validate existence first so a delete of an unknown id surfaces
        // SESSION_NOT_FOUND rather than silently no-op'ing the cleanup below.
        self.index.get(id)?;
        self.index.delete(id)?;
        self.transcripts.delete(id)?;
        self.todos.delete_session(id)?;
        Ok(())
    }

    /// Appends a message to a session's transcript. The index assigns the
    /// next `seq` under its own lock, so two concurrent appends to the
    /// same session can never race onto the same position.
    pub fn add_message(&self, new: NewMessage) -> Result<Message> {
        self.index.get(&new.session_id)?;
        let seq = self.index.reserve_seq(&new.session_id)?;
        let cost = new.cost;
        match self.transcripts.append(new.clone(), seq) {
            Ok(message) => {
                self.index.record_cost(&message.session_id, cost)?;
                Ok(message)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.index.get(session_id)?;
        self.transcripts.read(session_id)
    }

    pub fn add_todo(&self, session_id: &str, content: impl Into<String>) -> Result<Todo> {
        self.index.get(session_id)?;
        self.todos.add(session_id, content)
    }

    /// Lists todos. With `session_id`, scoped to that session (which must
    /// exist); without one, every todo across every session, newest-first.
    /// `status`, if given, filters to that status in either case.
    pub fn list_todos(&self, session_id: Option<&str>, status: Option<TodoStatus>) -> Result<Vec<Todo>> {
        match session_id {
            Some(id) => {
                self.index.get(id)?;
                Ok(self.todos.list(id, status))
            }
            None => Ok(self.todos.list_all(status)),
        }
    }

    pub fn update_todo_status(&self, session_id: &str, todo_id: &str, status: TodoStatus) -> Result<Todo> {
        self.todos.update_status(session_id, todo_id, status)
    }

    pub fn health(&self) -> HealthReport {
        self.index.health()
    }
}
