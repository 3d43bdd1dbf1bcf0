//! Validates config, then constructs every subsystem in dependency order
//! and wires them into a [`ChatFacade`].
//!
//! Grounded in the teacher's `workspace::bootstrap::build_app_state`: log
//! each subsystem as it comes up, fail fast on a config error, and record
//! (rather than abort on) a misconfigured provider.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chatcore_domain::config::{Config, ConfigSeverity};
use chatcore_orchestrator::{ContextConfig, ContextManager, Notifier, SessionLockMap, TurnOrchestrator};
use chatcore_providers::ProviderRegistry;
use chatcore_sessions::SessionStore;
use chatcore_tools::ExecutionQueue;

use crate::facade::ChatFacade;
use crate::system_prompt::DefaultSystemPromptCatalog;

/// Builds a [`ChatFacade`] ready to serve turns, or fails with a summary
/// of every config error found.
pub async fn build_facade(config: Arc<Config>) -> anyhow::Result<ChatFacade> {
    tracing::info!("chatcore starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Session store ─────────────────────────────────────────────────
    let state_dir = PathBuf::from(&config.sessions.state_dir);
    let store = Arc::new(SessionStore::new(&state_dir)?);
    tracing::info!(path = %state_dir.display(), "session store ready");

    // ── Tool registry + execution queue ──────────────────────────────
    let registry = Arc::new(chatcore_tools::build_default_registry(store.clone()));
    let queue = ExecutionQueue::new(
        registry.clone(),
        store.clone(),
        config.execution_queue.max_concurrent,
        Duration::from_millis(config.execution_queue.default_timeout_ms),
    );
    tracing::info!(
        max_concurrent = config.execution_queue.max_concurrent,
        "execution queue ready"
    );

    // ── Providers ──────────────────────────────────────────────────────
    let providers = Arc::new(ProviderRegistry::from_config(
        &config.providers,
        config.default_provider.clone(),
    ));
    if providers.is_empty() {
        tracing::warn!("no providers initialized; chat requests will fail until one is configured");
    }
    for err in providers.init_errors() {
        tracing::warn!(provider_id = %err.provider_id, error = %err.message, "provider failed to initialize");
    }

    // ── Realtime + concurrency control ────────────────────────────────
    let notifier = Arc::new(Notifier::new());
    let locks = Arc::new(SessionLockMap::new());
    let context = ContextManager::new(ContextConfig {
        max_tokens: config.context.max_tokens,
        chars_per_token: config.context.chars_per_token,
    });

    // ── Turn orchestrator ──────────────────────────────────────────────
    let workspace_root = PathBuf::from(&config.workspace.path);
    let orchestrator = Arc::new(TurnOrchestrator::new(
        store.clone(),
        registry,
        queue,
        providers.clone(),
        notifier.clone(),
        locks.clone(),
        context,
        workspace_root,
    ));
    tracing::info!("turn orchestrator ready");

    let prompts = Arc::new(DefaultSystemPromptCatalog::new());

    Ok(ChatFacade::new(store, orchestrator, providers, notifier, locks, prompts))
}

/// Spawns housekeeping tasks for a long-lived process (the REPL). Prunes
/// idle per-session locks periodically so the map doesn't grow unbounded
/// across a long chat session's many distinct session ids.
pub fn spawn_background_tasks(facade: ChatFacade) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            facade.prune_idle_locks();
        }
    });
}
