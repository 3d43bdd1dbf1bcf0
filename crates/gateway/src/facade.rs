//! The Chat Facade — the single entry point external callers (the REPL,
//! and eventually any other front end) use to drive a conversation.
//!
//! Grounded in the teacher's `AppState` (`state.rs`): one struct holding
//! `Arc`s to every subsystem, constructed once at startup and cloned
//! cheaply per request/command.

use std::sync::Arc;

use chatcore_domain::error::Result;
use chatcore_domain::message::{Message, NewMessage};
use chatcore_domain::session::{Session, SessionUpdate};
use chatcore_orchestrator::{Notifier, SessionLockMap, TurnOptions, TurnOrchestrator};
use chatcore_providers::ProviderRegistry;
use chatcore_sessions::SessionStore;

use crate::system_prompt::SystemPromptCatalog;

/// A session plus the messages persisted for it so far.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: Session,
    pub messages: Vec<Message>,
}

/// Everything a caller needs to start, resume, or inspect conversations.
///
/// Cheap to clone: every field is an `Arc` (or is itself internally
/// `Arc`-backed), so handing a `ChatFacade` to a new REPL command or
/// background task is just a refcount bump.
#[derive(Clone)]
pub struct ChatFacade {
    store: Arc<SessionStore>,
    orchestrator: Arc<TurnOrchestrator>,
    providers: Arc<ProviderRegistry>,
    notifier: Arc<Notifier>,
    locks: Arc<SessionLockMap>,
    prompts: Arc<dyn SystemPromptCatalog>,
}

impl ChatFacade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<SessionStore>,
        orchestrator: Arc<TurnOrchestrator>,
        providers: Arc<ProviderRegistry>,
        notifier: Arc<Notifier>,
        locks: Arc<SessionLockMap>,
        prompts: Arc<dyn SystemPromptCatalog>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            providers,
            notifier,
            locks,
            prompts,
        }
    }

    /// Creates a new session, seeding it with a resolved system prompt and
    /// any provider/model defaults the caller names.
    pub fn create_session(
        &self,
        title: Option<String>,
        system_prompt_id: Option<&str>,
        provider: Option<String>,
        model: Option<String>,
        session_id: Option<String>,
    ) -> Result<Session> {
        let session = self.store.create_session(session_id)?;
        let system_prompt = self.prompts.resolve(system_prompt_id);
        let session = self.store.update_session(
            &session.id,
            SessionUpdate {
                title,
                status: None,
                provider,
                model,
                system_prompt: Some(system_prompt.clone()),
                metadata: None,
            },
        )?;
        // The data model requires the first message of a session to be
        // role=system (`spec.md` §3); the session's frozen `system_prompt`
        // field alone isn't enough to satisfy that invariant in the
        // transcript itself.
        self.store.add_message(NewMessage::system(&session.id, system_prompt))?;
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> Result<SessionDetail> {
        let session = self.store.get_session(session_id)?;
        let messages = self.store.get_session_messages(session_id)?;
        Ok(SessionDetail { session, messages })
    }

    pub fn list_sessions(&self, limit: Option<usize>, offset: usize) -> Vec<Session> {
        self.store.list_sessions(limit, offset, None)
    }

    /// Sends a user message, creating the session first if it doesn't
    /// exist yet, and drives the turn loop to completion.
    pub async fn send_message(
        &self,
        session_id: &str,
        content: &str,
        provider: Option<String>,
        model: Option<String>,
    ) -> Result<Message> {
        if self.store.get_session(session_id).is_err() {
            let session = self.create_session(None, None, provider.clone(), model.clone(), Some(session_id.to_string()))?;
            debug_assert_eq!(session.id, session_id);
        }

        let options = TurnOptions { provider, model };
        self.orchestrator.run_turn(session_id, content, &options).await
    }

    pub fn update_system_prompt(&self, session_id: &str, system_prompt_id: &str) -> Result<Session> {
        let system_prompt = self.prompts.resolve(Some(system_prompt_id));
        self.store.update_session(
            session_id,
            SessionUpdate {
                title: None,
                status: None,
                provider: None,
                model: None,
                system_prompt: Some(system_prompt),
                metadata: None,
            },
        )
    }

    /// Aborts the turn in flight for `session_id`, if any.
    pub fn abort(&self, session_id: &str) -> bool {
        self.orchestrator.abort(session_id)
    }

    pub fn is_busy(&self, session_id: &str) -> bool {
        self.orchestrator.is_busy(session_id)
    }

    pub fn providers(&self) -> Vec<String> {
        self.providers.providers()
    }

    /// Registers a provider adapter at runtime (e.g. one not present in
    /// the config file), in addition to whatever `Config::providers`
    /// resolved at startup.
    pub fn register_provider(&self, adapter: Arc<dyn chatcore_providers::ProviderAdapter>) {
        self.providers.register(adapter);
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn chatcore_providers::ProviderAdapter>> {
        self.providers.get(name)
    }

    pub fn notifier(&self) -> Arc<Notifier> {
        self.notifier.clone()
    }

    /// Drops per-session locks that haven't been touched recently. Called
    /// periodically by a background task in a long-lived process.
    pub fn prune_idle_locks(&self) {
        self.locks.prune_idle();
    }
}
