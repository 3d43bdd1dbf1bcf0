//! Sessions: the top-level unit of conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
    Error,
}

impl SessionStatus {
    /// Status transitions are forward-only: Active -> Archived -> Error is
    /// allowed, moving back to Active from either terminal state is not.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Active, Archived) | (Active, Error) => true,
            (Archived, Error) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub message_count: u64,
    pub total_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            parent_id: None,
            provider: None,
            model: None,
            system_prompt: None,
            message_count: 0,
            total_cost: 0.0,
            metadata: None,
        }
    }

    pub fn transition_to(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::new(
                crate::error::ErrorCode::ValidationError,
                format!("cannot transition session {:?} -> {:?}", self.status, next),
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Patch applied by `SessionStore::update_session`; every field is
/// optional so callers only touch what they mean to change.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub status: Option<SessionStatus>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_only_transitions() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Archived));
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Error));
        assert!(SessionStatus::Archived.can_transition_to(SessionStatus::Error));
        assert!(!SessionStatus::Archived.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Error.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Error.can_transition_to(SessionStatus::Archived));
    }

    #[test]
    fn transition_to_rejects_backward_move() {
        let mut s = Session::new("s1");
        s.transition_to(SessionStatus::Archived).unwrap();
        assert!(s.transition_to(SessionStatus::Active).is_err());
    }
}
