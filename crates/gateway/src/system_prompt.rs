//! Resolves a system-prompt id to prompt text for a new session.
//!
//! The contents of any particular catalog are out of scope here — what
//! matters is that every session is seeded with *some* resolved prompt
//! the same way the teacher's runtime seeds a session's system message
//! before the first turn (`runtime/turn.rs::build_system_context`).

/// Looks up system-prompt text by id.
pub trait SystemPromptCatalog: Send + Sync {
    /// Resolves `id` to prompt text, falling back to a sensible default
    /// when `id` is `None` or unknown.
    fn resolve(&self, id: Option<&str>) -> String;
}

/// A catalog with a single built-in default prompt. Real deployments can
/// swap in a catalog backed by a file or a config-driven registry without
/// touching the facade or orchestrator.
pub struct DefaultSystemPromptCatalog {
    default_prompt: String,
}

impl DefaultSystemPromptCatalog {
    pub fn new() -> Self {
        Self {
            default_prompt: "You are a helpful coding assistant with access to a small set of \
                file and shell tools scoped to the current workspace. Be concise."
                .to_string(),
        }
    }
}

impl Default for DefaultSystemPromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPromptCatalog for DefaultSystemPromptCatalog {
    fn resolve(&self, id: Option<&str>) -> String {
        match id {
            None | Some("default") => self.default_prompt.clone(),
            Some(other) => {
                tracing::warn!(system_prompt_id = other, "unknown system prompt id, using default");
                self.default_prompt.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_falls_back_to_default() {
        let catalog = DefaultSystemPromptCatalog::new();
        assert_eq!(catalog.resolve(Some("ghost")), catalog.resolve(None));
    }
}
