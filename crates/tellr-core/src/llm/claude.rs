//! Claude (Anthropic) LLM provider
//!
//! Connects to Anthropic's Messages API for completions.

use super::provider::{http_agent, key_status};
use super::{CompletionRequest, LlmError, LlmProvider, ProviderStatus};

/// Claude provider for Anthropic's API
pub struct ClaudeProvider {
    /// API key
    api_key: String,

    /// Base URL for the API
    base_url: String,

    /// Model to use
    model: String,

    /// HTTP client
    agent: ureq::Agent,
}

impl ClaudeProvider {
    /// Create a new Claude provider
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.to_string(),
            agent: http_agent(timeout_secs),
        }
    }

    /// Create with a specific base URL (for proxies)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

impl LlmProvider for ClaudeProvider {
    fn id(&self) -> &str {
        "claude"
    }

    fn name(&self) -> &str {
        "Claude"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn status(&self) -> ProviderStatus {
        key_status(&self.api_key)
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if let ProviderStatus::Unavailable(reason) = self.status() {
            return Err(LlmError::ProviderUnavailable(format!("claude: {}", reason)));
        }

        let body = build_body(&self.model, request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", "2023-06-01")
            .send_json(&body)?;

        let json: serde_json::Value = response.into_json()?;
        extract_text(&json)
    }
}

/// Build the Messages API request body
fn build_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let conversation: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": conversation
    });

    if !request.system.trim().is_empty() {
        body["system"] = serde_json::Value::String(request.system.trim().to_string());
    }

    body
}

/// Join every text block of the reply
fn extract_text(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Err(LlmError::Api {
            status: 500,
            message: message.to_string(),
        });
    }

    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::InvalidResponse("Invalid Anthropic response".to_string()))?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();

    Ok(text.trim().to_string())
}
