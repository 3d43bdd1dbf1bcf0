//! The Turn Orchestrator (`spec.md` §4.7) — the heart of the core: drives
//! the user -> LLM -> tools -> LLM loop for one turn, persisting every
//! message through the Session Store and fanning events out through the
//! Realtime Notifier.
//!
//! The rest of this crate is the machinery the loop depends on: a
//! deterministic Context Manager (§4.4), a per-session broadcast Notifier
//! (§4.6), and a per-session exclusivity lock (§4.7 "at most one active
//! turn per session id").

pub mod context;
pub mod notifier;
pub mod session_lock;
pub mod turn;

pub use context::{ContextConfig, ContextManager};
pub use notifier::{Event, Notifier, ToolStatus};
pub use session_lock::SessionLockMap;
pub use turn::{TurnOptions, TurnOrchestrator};
