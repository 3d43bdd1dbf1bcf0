//! Realtime Notifier: per-session broadcast of turn activity to any
//! number of subscribers (`spec.md` §4.6).
//!
//! Grounded in the teacher's `RunStore` broadcast channels
//! (`gateway::runtime::runs::RunStore::subscribe`/`emit`), keyed by
//! session id instead of run id since a session outlives any one turn.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "message.user.new")]
    UserMessage { session_id: String, message_id: String },
    #[serde(rename = "message.assistant.new")]
    AssistantMessage { session_id: String, message_id: String, has_tool_calls: bool },
    #[serde(rename = "tool.status")]
    ToolStatus { session_id: String, tool_call_id: String, status: ToolStatus, message: Option<String> },
    #[serde(rename = "turn.finished")]
    TurnFinished { session_id: String, turn_id: String },
    #[serde(rename = "turn.error")]
    TurnError { session_id: String, turn_id: String, message: String },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Dispatched,
    Completed,
    Failed,
}

/// Best-effort pub/sub: a subscriber that's lagging loses the oldest
/// events rather than blocking the turn that's emitting them
/// (`broadcast::Sender`'s native drop-oldest-on-lag behavior).
pub struct Notifier {
    channels: RwLock<HashMap<String, broadcast::Sender<Event>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self { channels: RwLock::new(HashMap::new()) }
    }

    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.write();
        let tx = channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        tx.subscribe()
    }

    /// Sends `event` to every current subscriber of `session_id`. A no-op
    /// if nobody is listening: there is no persistent log of events, only
    /// whoever is subscribed at emit time receives it.
    pub fn emit(&self, session_id: &str, event: Event) {
        let channels = self.channels.read();
        if let Some(tx) = channels.get(session_id) {
            let _ = tx.send(event);
        }
    }

    /// Drops the channel for a session once nobody can plausibly still be
    /// listening (e.g. on session archival), so idle sessions don't pin a
    /// broadcast buffer forever.
    pub fn remove(&self, session_id: &str) {
        self.channels.write().remove(session_id);
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.channels.read().get(session_id).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe("s1");
        notifier.emit("s1", Event::UserMessage { session_id: "s1".into(), message_id: "m1".into() });

        let event = rx.recv().await.unwrap();
        matches!(event, Event::UserMessage { .. });
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let notifier = Notifier::new();
        notifier.emit("ghost", Event::TurnFinished { session_id: "ghost".into(), turn_id: "t1".into() });
    }

    #[tokio::test]
    async fn independent_sessions_have_independent_channels() {
        let notifier = Notifier::new();
        let mut rx1 = notifier.subscribe("s1");
        let _rx2 = notifier.subscribe("s2");

        notifier.emit("s1", Event::TurnFinished { session_id: "s1".into(), turn_id: "t1".into() });
        let event = tokio::time::timeout(std::time::Duration::from_millis(100), rx1.recv()).await;
        assert!(event.is_ok());
    }

    #[test]
    fn remove_drops_the_channel() {
        let notifier = Notifier::new();
        let _rx = notifier.subscribe("s1");
        assert_eq!(notifier.subscriber_count("s1"), 1);
        notifier.remove("s1");
        assert_eq!(notifier.subscriber_count("s1"), 0);
    }
}
