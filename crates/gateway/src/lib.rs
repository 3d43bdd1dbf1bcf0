//! Process-level wiring: config loading, subsystem bootstrap, the Chat
//! Facade, and the `chatcore` CLI built on top of it.

pub mod bootstrap;
pub mod cli;
pub mod facade;
pub mod system_prompt;

pub use facade::{ChatFacade, SessionDetail};
