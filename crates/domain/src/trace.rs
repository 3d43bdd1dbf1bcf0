//! Structured trace events, one `tracing::info!` call per event so logs
//! stay greppable without a second source of truth.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionArchived {
        session_id: String,
    },
    TurnStarted {
        session_id: String,
        turn_id: String,
    },
    TurnFinished {
        session_id: String,
        turn_id: String,
        loop_count: usize,
        input_tokens: u64,
        output_tokens: u64,
    },
    TurnAborted {
        session_id: String,
        turn_id: String,
        reason: String,
    },
    ToolDispatched {
        session_id: String,
        call_id: String,
        tool_name: String,
    },
    ToolCompleted {
        session_id: String,
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    ToolTimedOut {
        session_id: String,
        call_id: String,
        tool_name: String,
        timeout_ms: u64,
    },
    ContextTrimmed {
        session_id: String,
        kept_messages: usize,
        dropped_messages: usize,
        estimated_tokens: u64,
    },
    ProviderCallFailed {
        session_id: String,
        provider: String,
        message: String,
    },
    ToolExecutionRecorded {
        session_id: String,
        tool: String,
        success: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    /// Serializes and logs itself at `info` level, tagged `core_event` so
    /// it's easy to filter out of the rest of the log stream.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(trace_event = %json, "core_event"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize trace event"),
        }
    }
}
