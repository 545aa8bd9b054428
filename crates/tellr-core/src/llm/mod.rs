//! LLM integration module
//!
//! Provides the blocking transport the oracle sits on.
//!
//! Supported providers:
//! - Claude (Anthropic API)
//! - OpenAI (and compatible endpoints)
//! - Ollama (local inference)

mod claude;
mod error;
mod message;
mod ollama;
mod openai;
mod provider;
mod registry;

pub use error::LlmError;
pub use message::{ChatMessage, CompletionRequest, Role};
pub use provider::{LlmProvider, ProviderStatus, SharedProvider};
pub(crate) use provider::http_agent;
pub use registry::{ProviderInfo, ProviderRegistry};

// Provider implementations
pub use claude::ClaudeProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
