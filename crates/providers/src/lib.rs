//! Uniform contract over remote LLM providers (`spec.md` §4.5): two
//! concrete adapters (Anthropic native, OpenAI-compatible chat completions)
//! plus a registry that resolves a named or default provider.

pub mod anthropic;
pub mod openai_compat;
pub mod registry;
pub mod traits;
pub(crate) mod util;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderInitError, ProviderRegistry};
pub use traits::{AssistantMessage, ChatOptions, ProviderAdapter};
pub use util::resolve_api_key;
