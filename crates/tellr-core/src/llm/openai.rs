//! OpenAI LLM provider
//!
//! Connects to OpenAI's chat completions API (or any compatible endpoint).

use super::provider::{http_agent, key_status};
use super::{CompletionRequest, LlmError, LlmProvider, ProviderStatus};

/// OpenAI provider
pub struct OpenAIProvider {
    api_key: String,

    /// Base URL for the API (supports OpenAI-compatible APIs)
    base_url: String,

    model: String,

    agent: ureq::Agent,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.to_string(),
            agent: http_agent(timeout_secs),
        }
    }

    /// Create with a specific base URL (for OpenAI-compatible APIs like Azure, local proxies)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

impl LlmProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn status(&self) -> ProviderStatus {
        key_status(&self.api_key)
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if let ProviderStatus::Unavailable(reason) = self.status() {
            return Err(LlmError::ProviderUnavailable(format!("openai: {}", reason)));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": request.chat_messages(),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature
        });

        let response = self
            .agent
            .post(&format!("{}/chat/completions", self.base_url))
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)?;

        let json: serde_json::Value = response.into_json()?;
        extract_text(&json)
    }
}

fn extract_text(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse("Invalid OpenAI response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " ok "}}]
        });
        assert_eq!(extract_text(&json).unwrap(), "ok");
    }

    #[test]
    fn test_extract_text_invalid() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            extract_text(&json),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
