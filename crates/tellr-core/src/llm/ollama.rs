//! Ollama LLM provider
//!
//! Connects to a local Ollama instance for chat completions.

use super::provider::http_agent;
use super::{CompletionRequest, LlmError, LlmProvider, ProviderStatus};

/// Ollama provider for local LLM inference
pub struct OllamaProvider {
    /// Base URL for Ollama API
    base_url: String,

    /// Model to use
    model: String,

    agent: ureq::Agent,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            agent: http_agent(timeout_secs),
        }
    }
}

impl LlmProvider for OllamaProvider {
    fn id(&self) -> &str {
        "ollama"
    }

    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn status(&self) -> ProviderStatus {
        // Local server; reachability is only known once a request is made
        ProviderStatus::Ready
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.chat_messages(),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens
            }
        });

        let response = self
            .agent
            .post(&format!("{}/api/chat", self.base_url))
            .set("Content-Type", "application/json")
            .send_json(&body)?;

        let json: serde_json::Value = response.into_json()?;

        json.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("Invalid Ollama response".to_string()))
    }
}
