//! Concrete tools, the registry that hosts them, and the bounded execution
//! queue that dispatches calls to them (`spec.md` §4.2, §4.3, §6).
//!
//! The eleven named tools are part of the external contract to the LLM —
//! their names and parameter schemas must be preserved verbatim once an
//! assistant prompt has been built against them.

pub mod builtins;
pub mod output_buffer;
pub mod path;
pub mod queue;
pub mod registry;

pub use output_buffer::OutputBuffer;
pub use queue::ExecutionQueue;
pub use registry::{Tool, ToolRegistry};

use std::sync::Arc;

use chatcore_sessions::SessionStore;

/// Builds the registry of concrete tools the gateway ships
/// (`read`, `write`, `edit`, `multiedit`, `list`, `grep`, `glob`, `bash`,
/// `webfetch`, `websearch`, `todo`).
pub fn build_default_registry(store: Arc<SessionStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(builtins::read::ReadTool));
    registry.register(Arc::new(builtins::write::WriteTool));
    registry.register(Arc::new(builtins::edit::EditTool));
    registry.register(Arc::new(builtins::multiedit::MultiEditTool));
    registry.register(Arc::new(builtins::list::ListTool));
    registry.register(Arc::new(builtins::grep::GrepTool));
    registry.register(Arc::new(builtins::glob_tool::GlobTool));
    registry.register(Arc::new(builtins::bash::BashTool));
    registry.register(Arc::new(builtins::webfetch::WebFetchTool::new()));
    registry.register(Arc::new(builtins::websearch::WebSearchTool::new()));
    registry.register(Arc::new(builtins::todo::TodoTool::new(store)));
    registry
}
