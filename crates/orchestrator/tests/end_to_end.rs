//! End-to-end scenarios from the turn-loop contract, exercised through the
//! public orchestrator API rather than its internals.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatcore_domain::message::{Message, NewMessage, Role};
use chatcore_domain::error::Result;
use chatcore_orchestrator::{ContextConfig, ContextManager, Notifier, SessionLockMap, TurnOptions, TurnOrchestrator};
use chatcore_providers::{AssistantMessage, ChatOptions, ProviderAdapter, ProviderRegistry};
use chatcore_sessions::SessionStore;
use chatcore_tools::ExecutionQueue;

struct EchoProvider;

#[async_trait]
impl ProviderAdapter for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn models(&self) -> &[String] {
        &[]
    }

    async fn chat(&self, messages: &[Message], _options: &ChatOptions) -> Result<AssistantMessage> {
        let last_user = messages.iter().rev().find(|m| m.role == Role::User);
        let reply = match last_user {
            Some(m) => format!("echo: {}", m.content),
            None => "echo: (nothing)".to_string(),
        };
        Ok(AssistantMessage {
            content: reply,
            tool_calls: vec![],
            model: "echo-model".to_string(),
            input_tokens: Some(1),
            output_tokens: Some(1),
        })
    }
}

#[tokio::test]
async fn send_message_persists_a_linearizable_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::new(dir.path()).unwrap());
    let registry = Arc::new(chatcore_tools::ToolRegistry::new());
    let queue = ExecutionQueue::new(registry.clone(), store.clone(), 3, Duration::from_secs(5));

    let mut providers = ProviderRegistry::from_config(&[], None);
    providers.register(Arc::new(EchoProvider));
    let providers = Arc::new(providers);

    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        registry,
        queue,
        providers,
        Arc::new(Notifier::new()),
        Arc::new(SessionLockMap::new()),
        ContextManager::new(ContextConfig::default()),
        dir.path().to_path_buf(),
    );

    let session = store.create_session(None).unwrap();
    store.add_message(NewMessage::system(&session.id, "be terse")).unwrap();

    let options = TurnOptions { provider: Some("echo".into()), model: None };
    let reply = orchestrator.run_turn(&session.id, "ping", &options).await.unwrap();
    assert_eq!(reply.content, "echo: ping");

    let messages = store.get_session_messages(&session.id).unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.windows(2).all(|w| w[0].seq < w[1].seq));

    let session = store.get_session(&session.id).unwrap();
    assert_eq!(session.message_count, 3);
}

#[tokio::test]
async fn unknown_provider_surfaces_llm_model_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::new(dir.path()).unwrap());
    let registry = Arc::new(chatcore_tools::ToolRegistry::new());
    let queue = ExecutionQueue::new(registry.clone(), store.clone(), 3, Duration::from_secs(5));
    let providers = Arc::new(ProviderRegistry::from_config(&[], None));

    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        registry,
        queue,
        providers,
        Arc::new(Notifier::new()),
        Arc::new(SessionLockMap::new()),
        ContextManager::new(ContextConfig::default()),
        dir.path().to_path_buf(),
    );

    let session = store.create_session(None).unwrap();
    store.add_message(NewMessage::system(&session.id, "be terse")).unwrap();

    let options = TurnOptions { provider: Some("ghost".into()), model: None };
    let err = orchestrator.run_turn(&session.id, "ping", &options).await.unwrap_err();
    assert_eq!(err.code, chatcore_domain::error::ErrorCode::LlmModelNotFound);

    // Partial state (the user message) remains visible after the failure.
    let messages = store.get_session_messages(&session.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::User);
}
