//! Append-only JSONL message transcripts, one file per session.
//!
//! `get_session_messages` is a deterministic replay of this file — it is
//! the only source of truth for a session's messages, there is no
//! in-memory cache to fall out of sync with it.

use std::path::{Path, PathBuf};

use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::message::{Message, NewMessage, Role};
use chrono::Utc;

pub struct Transcripts {
    base_dir: PathBuf,
}

impl Transcripts {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }

    /// Appends one message, assigning `id`, `seq`, and `created_at`.
    /// `seq` must be the next expected value for this session (the caller
    /// — `SessionStore` — gets it from the session index under its lock so
    /// concurrent appends to the same session serialize correctly).
    pub fn append(&self, new: NewMessage, seq: u64) -> Result<Message> {
        if seq == 0 && new.role != Role::System {
            return Err(Error::new(
                ErrorCode::ValidationError,
                "the first message of a session must have role=system",
            ));
        }
        if new.role == Role::Tool && new.tool_call_id.is_none() {
            return Err(Error::tool_invalid_params(
                "a tool-role message must carry tool_call_id",
            ));
        }

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: new.session_id.clone(),
            role: new.role,
            content: new.content,
            created_at: Utc::now(),
            seq,
            tool_calls: new.tool_calls,
            tool_call_id: new.tool_call_id,
            provider: new.provider,
            model: new.model,
            cost: new.cost,
            input_tokens: new.input_tokens,
            output_tokens: new.output_tokens,
            metadata: new.metadata,
        };

        let path = self.path(&new.session_id);
        let line = serde_json::to_string(&message)?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(message)
    }

    /// Replays the transcript for a session in insertion order.
    pub fn read(&self, session_id: &str) -> Result<Vec<Message>> {
        let path = self.path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut messages = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(m) => messages.push(m),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "skipping malformed transcript line");
                }
            }
        }
        Ok(messages)
    }

    pub fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.path(session_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
