//! Tool definitions and the execution contract tools run under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Filesystem,
    Search,
    Execution,
    Intelligence,
    Management,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: Some(default),
        }
    }
}

/// The static shape of a tool, as advertised to providers and used to
/// validate arguments before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            parameters,
        }
    }
}

/// Ambient state a tool body executes under. Every field is read-only from
/// the tool's perspective.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub working_directory: String,
    pub timeout: std::time::Duration,
    pub env: HashMap<String, String>,
}

/// The result of one tool invocation, persisted verbatim into the
/// answering tool message's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: None,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            metadata: None,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
