//! Structured error envelope shared across all chatcore crates.
//!
//! Every public operation in the core returns `Result<T>`, where the error
//! variant always carries a stable [`ErrorCode`] a transport can map to a
//! status, a human message, optional machine-readable `context`, an optional
//! wrapped `cause`, and a `recoverable` flag the turn loop uses to decide
//! whether a failure should surface as a tool message (recoverable) or abort
//! the turn (not).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable error codes. Grouped by the taxonomy in the error-handling design:
/// input, not-found, resource, external-system, tool-lifecycle, storage,
/// internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors — recoverable.
    ToolInvalidParams,
    ValidationError,
    CliUsageError,

    // Not-found errors.
    SessionNotFound,
    ToolNotFound,
    NotFound,

    // Resource errors.
    FileNotFound,
    FileAccessDenied,
    FileTooLarge,
    DirectoryNotFound,

    // External-system errors.
    LlmApiError,
    LlmContextTooLong,
    LlmModelNotFound,
    ProviderAuthFailed,
    ProviderRateLimited,
    NetworkError,

    // Tool-lifecycle errors.
    ToolTimeout,
    ToolExecutionFailed,
    ToolPermissionDenied,
    ToolCancelled,

    // Storage errors.
    DatabaseConnection,
    DatabaseQuery,
    DatabaseTransaction,
    DatabaseMigration,
    DatabaseCorruption,

    // Internal.
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Whether this class of error is recoverable by default (the caller may
    /// retry, or a tool body's failure may be fed back to the model).
    ///
    /// This is only a default — callers may override via
    /// [`Error::with_recoverable`] when context demands it (e.g. a
    /// `TOOL_EXECUTION_FAILED` is always recoverable because tool bodies
    /// never abort the turn on their own).
    pub fn default_recoverable(self) -> bool {
        use ErrorCode::*;
        !matches!(
            self,
            DatabaseConnection
                | DatabaseQuery
                | DatabaseTransaction
                | DatabaseMigration
                | DatabaseCorruption
                | InternalError
                | UnknownError
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_value(self).unwrap_or(Value::Null);
        write!(f, "{}", json.as_str().unwrap_or("UNKNOWN_ERROR"))
    }
}

/// The structured error type returned by every public operation.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<Error>>,
    pub recoverable: bool,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            recoverable: code.default_recoverable(),
            code,
            message: message.into(),
            context: None,
            cause: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    // ── Common constructors (mirrors the taxonomy 1:1) ─────────────────

    pub fn session_not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(ErrorCode::SessionNotFound, format!("session not found: {id}"))
            .with_context(serde_json::json!({ "session_id": id }))
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::ToolNotFound, format!("tool not found: {name}"))
            .with_context(serde_json::json!({ "tool": name }))
    }

    pub fn tool_invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolInvalidParams, message)
    }

    pub fn tool_execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolExecutionFailed, message)
    }

    pub fn tool_timeout(timeout_ms: u64) -> Self {
        Self::new(ErrorCode::ToolTimeout, format!("tool call timed out after {timeout_ms}ms"))
    }

    pub fn tool_cancelled() -> Self {
        Self::new(ErrorCode::ToolCancelled, "tool call cancelled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let code = match e.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileAccessDenied,
            _ => ErrorCode::InternalError,
        };
        Self::new(code, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::ValidationError, format!("JSON: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_serializes_screaming_snake() {
        assert_eq!(ErrorCode::SessionNotFound.to_string(), "SESSION_NOT_FOUND");
        assert_eq!(ErrorCode::LlmApiError.to_string(), "LLM_API_ERROR");
    }

    #[test]
    fn tool_execution_failed_is_recoverable() {
        let e = Error::tool_execution_failed("boom");
        assert!(e.recoverable);
    }

    #[test]
    fn database_errors_default_unrecoverable() {
        let e = Error::new(ErrorCode::DatabaseConnection, "down");
        assert!(!e.recoverable);
    }
}
