//! The abstract provider contract (`spec.md` §4.5): a uniform surface over
//! any HTTP-based LLM that supports tool/function calling, hiding the wire
//! format behind a single `chat` call.

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::message::{Message, ToolCall};
use chatcore_domain::tool::ToolDefinition;

/// One turn's worth of context handed to a provider.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model override; `None` lets the adapter use its configured default.
    pub model: Option<String>,
    /// Tool definitions the model may invoke this turn.
    pub tools: Vec<ToolDefinition>,
}

/// The provider's reply to one `chat` call. Always `role = assistant`;
/// `content` may be empty when the turn is purely tool calls.
#[derive(Debug, Clone)]
pub struct AssistantMessage {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl AssistantMessage {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Implemented by every concrete LLM adapter. Adapters translate the
/// abstract `Message` sequence into their own wire format, including
/// mapping `role=tool` messages into the provider-specific "tool result"
/// shape and flattening assistant text + tool calls into the provider's
/// multi-part representation.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A short, stable identifier (distinct from the config id it was built
    /// from, though adapters typically reuse it).
    fn name(&self) -> &str;

    /// Model identifiers this adapter can drive.
    fn models(&self) -> &[String];

    /// Run one request/response round-trip against the remote LLM.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<AssistantMessage>;
}
