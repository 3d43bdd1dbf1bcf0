//! Conversation messages and tool calls — provider-agnostic.
//!
//! Every adapter in `chatcore-providers` translates this shape to and from
//! its own wire format; nothing downstream of the Turn Orchestrator should
//! ever see a provider-specific message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A single message in a session's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Total order of this message within its session. Assigned by the
    /// store on append; used to replay transcripts deterministically.
    pub seq: u64,

    /// Present only on assistant messages that invoke tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present only on tool-role messages; references the `ToolCall::id`
    /// this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fields needed to append a new message; the store assigns `id`, `seq`,
/// and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub cost: Option<f64>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub metadata: Option<Value>,
}

impl NewMessage {
    pub fn new(session_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            provider: None,
            model: None,
            cost: None,
            input_tokens: None,
            output_tokens: None,
            metadata: None,
        }
    }

    pub fn system(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::System, content)
    }

    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::User, content)
    }

    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::Assistant, content)
    }

    pub fn tool_result(
        session_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut m = Self::new(session_id, Role::Tool, content);
        m.tool_call_id = Some(tool_call_id.into());
        m
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
