//! LLM provider trait and status

use super::{CompletionRequest, LlmError};

/// Provider status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Ready to accept requests
    Ready,

    /// Not available (no API key, disabled, etc.)
    Unavailable(String),
}

impl ProviderStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProviderStatus::Ready)
    }
}

/// LLM provider trait
///
/// Defines the interface for LLM providers (Claude, OpenAI, Ollama). Calls are
/// blocking: a run issues one request at a time and waits for the full reply.
pub trait LlmProvider: Send + Sync {
    /// Get the provider's unique identifier (e.g., "claude", "openai", "ollama")
    fn id(&self) -> &str;

    /// Get the provider's display name
    fn name(&self) -> &str;

    /// Get the model requests are sent to
    fn model(&self) -> String;

    /// Get current provider status
    fn status(&self) -> ProviderStatus;

    /// Send a request and return the concatenated text of the reply
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Check if the provider is currently available
    fn is_available(&self) -> bool {
        self.status().is_ready()
    }
}

/// Wrapper to make Box<dyn LlmProvider> cloneable via Arc
pub type SharedProvider = std::sync::Arc<dyn LlmProvider>;

/// Build a ureq agent with the configured request timeout
pub(crate) fn http_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
}

/// Status for providers that need an API key
pub(crate) fn key_status(api_key: &str) -> ProviderStatus {
    if api_key.trim().is_empty() || api_key.starts_with("${") {
        ProviderStatus::Unavailable("No API key configured".to_string())
    } else {
        ProviderStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_ready() {
        assert!(ProviderStatus::Ready.is_ready());
    }

    #[test]
    fn test_provider_status_unavailable() {
        let status = ProviderStatus::Unavailable("No API key".to_string());
        assert!(!status.is_ready());
        assert!(matches!(status, ProviderStatus::Unavailable(msg) if msg == "No API key"));
    }

    #[test]
    fn test_key_status() {
        assert!(key_status("sk-123").is_ready());
        assert!(!key_status("").is_ready());
        // An unexpanded ${VAR} placeholder is not a key
        assert!(!key_status("${ANTHROPIC_API_KEY}").is_ready());
    }
}
