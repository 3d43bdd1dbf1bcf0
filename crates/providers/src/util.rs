//! Shared helpers for provider adapters.

use chatcore_domain::error::{Error, ErrorCode, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type, classifying
/// the common failure shapes an adapter has to distinguish (`spec.md` §4.5).
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::new(ErrorCode::NetworkError, format!("request timed out: {e}"))
    } else if e.is_connect() {
        Error::new(ErrorCode::NetworkError, format!("connection failed: {e}"))
    } else {
        Error::new(ErrorCode::LlmApiError, e.to_string())
    }
}

/// Classifies an HTTP status code from a provider response into the
/// taxonomy's external-system error codes.
pub(crate) fn error_for_status(status: reqwest::StatusCode, body: &str) -> Error {
    let code = match status.as_u16() {
        401 | 403 => ErrorCode::ProviderAuthFailed,
        429 => ErrorCode::ProviderRateLimited,
        400 if body.to_lowercase().contains("context") || body.to_lowercase().contains("too long") => {
            ErrorCode::LlmContextTooLong
        }
        404 => ErrorCode::LlmModelNotFound,
        _ => ErrorCode::LlmApiError,
    };
    Error::new(code, format!("provider returned {status}: {body}"))
}

/// Resolves the API key for a provider from the environment variable named
/// in its config. OAuth/credential-store management is out of scope for
/// this core (`spec.md` §1) — adapters only ever read a plain env var.
pub fn resolve_api_key(api_key_env: Option<&str>) -> Result<String> {
    let var = api_key_env.ok_or_else(|| {
        Error::new(
            ErrorCode::ProviderAuthFailed,
            "provider has no api_key_env configured",
        )
    })?;
    std::env::var(var).map_err(|_| {
        Error::new(
            ErrorCode::ProviderAuthFailed,
            format!("environment variable '{var}' not set"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_reads_env() {
        std::env::set_var("CHATCORE_TEST_KEY_1", "sk-test");
        let key = resolve_api_key(Some("CHATCORE_TEST_KEY_1")).unwrap();
        assert_eq!(key, "sk-test");
        std::env::remove_var("CHATCORE_TEST_KEY_1");
    }

    #[test]
    fn resolve_api_key_missing_env_errors() {
        let err = resolve_api_key(Some("CHATCORE_TEST_KEY_MISSING_XYZ")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderAuthFailed);
    }

    #[test]
    fn resolve_api_key_no_env_name_errors() {
        assert!(resolve_api_key(None).is_err());
    }
}
