//! Top-level configuration, loaded from TOML with environment overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionQueueConfig {
    pub max_concurrent: usize,
    pub default_timeout_ms: u64,
}

impl Default for ExecutionQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: u64,
    pub chars_per_token: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            chars_per_token: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub state_dir: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_dir: "./state/sessions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory the `read`/`write`/`bash`/`grep`/`glob` tools are
    /// confined to. The sole sandboxing guarantee (`spec.md` §1 Non-goals).
    pub path: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub execution_queue: ExecutionQueueConfig,
    pub context: ContextConfig,
    pub sessions: SessionsConfig,
    pub workspace: WorkspaceConfig,
    pub providers: Vec<ProviderConfig>,
    pub default_provider: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution_queue: ExecutionQueueConfig::default(),
            context: ContextConfig::default(),
            sessions: SessionsConfig::default(),
            workspace: WorkspaceConfig::default(),
            providers: Vec::new(),
            default_provider: None,
        }
    }
}

impl Config {
    pub fn load_from_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Validates cross-field invariants the type system can't express.
    /// Mirrors the teacher's startup check: warnings are logged, errors
    /// abort `serve`.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.execution_queue.max_concurrent == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "execution_queue.max_concurrent must be >= 1".into(),
            });
        }

        if self.context.max_tokens == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "context.max_tokens must be >= 1".into(),
            });
        }

        if self.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "no providers configured; chat requests will fail until one is added".into(),
            });
        }

        if let Some(default) = &self.default_provider {
            if !self.providers.iter().any(|p| &p.id == default) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    message: format!("default_provider '{default}' is not in providers"),
                });
            }
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_warns_on_no_providers() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(!Config::has_errors(&issues));
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn zero_concurrency_is_an_error() {
        let mut cfg = Config::default();
        cfg.execution_queue.max_concurrent = 0;
        let issues = cfg.validate();
        assert!(Config::has_errors(&issues));
    }

    #[test]
    fn dangling_default_provider_is_an_error() {
        let mut cfg = Config::default();
        cfg.default_provider = Some("ghost".into());
        let issues = cfg.validate();
        assert!(Config::has_errors(&issues));
    }

    #[test]
    fn parses_from_toml() {
        let toml_str = r#"
            default_provider = "anthropic"

            [execution_queue]
            max_concurrent = 5

            [[providers]]
            id = "anthropic"
            kind = "anthropic"
            default_model = "claude-sonnet"
        "#;
        let cfg = Config::load_from_str(toml_str).unwrap();
        assert_eq!(cfg.execution_queue.max_concurrent, 5);
        assert_eq!(cfg.providers.len(), 1);
        assert!(!Config::has_errors(&cfg.validate()));
    }
}
