//! The session index: create/get/list/update/delete over `Session` records,
//! persisted as a single JSON file under the configured state directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::session::{Session, SessionStatus, SessionUpdate};
use chatcore_domain::trace::TraceEvent;
use parking_lot::RwLock;

pub struct HealthReport {
    pub state_dir: PathBuf,
    pub session_count: usize,
}

pub struct SessionIndex {
    path: PathBuf,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionIndex {
    /// Loads (or creates) `state_dir/sessions.json`.
    pub fn new(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("sessions.json");
        let sessions = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %path.display(),
            "session index loaded"
        );

        Ok(Self {
            path,
            sessions: RwLock::new(sessions),
        })
    }

    pub fn create(&self, id: Option<String>) -> Result<Session> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(Error::new(
                ErrorCode::ValidationError,
                format!("session already exists: {id}"),
            ));
        }
        let session = Session::new(id.clone());
        sessions.insert(id.clone(), session.clone());
        drop(sessions);
        self.flush()?;

        TraceEvent::SessionCreated { session_id: id }.emit();
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Session> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::session_not_found(id))
    }

    /// Lists sessions newest-`updated_at`-first, optionally filtered by
    /// status and paginated with `limit`/`offset`.
    pub fn list(&self, limit: Option<usize>, offset: usize, status: Option<SessionStatus>) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| match status {
                Some(want) => s.status == want,
                None => true,
            })
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let sessions = sessions.into_iter().skip(offset);
        match limit {
            Some(limit) => sessions.take(limit).collect(),
            None => sessions.collect(),
        }
    }

    pub fn update(&self, id: &str, patch: SessionUpdate) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::session_not_found(id))?;

        if let Some(status) = patch.status {
            session.transition_to(status)?;
            if status == SessionStatus::Archived {
                TraceEvent::SessionArchived {
                    session_id: id.to_owned(),
                }
                .emit();
            }
        }
        if let Some(title) = patch.title {
            session.title = Some(title);
        }
        if let Some(provider) = patch.provider {
            session.provider = Some(provider);
        }
        if let Some(model) = patch.model {
            session.model = Some(model);
        }
        if let Some(system_prompt) = patch.system_prompt {
            session.system_prompt = Some(system_prompt);
        }
        if let Some(metadata) = patch.metadata {
            session.metadata = Some(metadata);
        }
        session.updated_at = Utc::now();
        let out = session.clone();
        drop(sessions);
        self.flush()?;
        Ok(out)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.remove(id).is_none() {
            return Err(Error::session_not_found(id));
        }
        drop(sessions);
        self.flush()
    }

    /// Reserves the next message `seq` for a session and bumps its
    /// `message_count`/`updated_at`. Held under the index's write lock, so
    /// two concurrent appends to the same session never reserve the same
    /// position.
    pub fn reserve_seq(&self, id: &str) -> Result<u64> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::session_not_found(id))?;
        let seq = session.message_count;
        session.message_count += 1;
        session.updated_at = Utc::now();
        drop(sessions);
        self.flush()?;
        Ok(seq)
    }

    pub fn record_cost(&self, id: &str, cost: Option<f64>) -> Result<()> {
        let Some(cost) = cost else { return Ok(()) };
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::session_not_found(id))?;
        session.total_cost += cost;
        drop(sessions);
        self.flush()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            state_dir: self
                .path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            session_count: self.sessions.read().len(),
        }
    }

    fn flush(&self) -> Result<()> {
        let sessions = self.sessions.read();
        let json = serde_json::to_string_pretty(&*sessions)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
