//! Planning oracle client
//!
//! Wraps an LLM provider behind two calls: free text (`ask_text`) and a JSON
//! object (`ask_structured`). Every caller of `ask_structured` has a fallback,
//! so a malformed reply is an ordinary error, never a panic.

use super::reply::{parse_reply, preview, OracleReply};
use crate::config::OracleConfig;
use crate::llm::{CompletionRequest, LlmError, SharedProvider};
use crate::{Result, TellrError};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Appended to every structured system prompt
pub const JSON_ONLY_INSTRUCTION: &str = "\n\nYou MUST respond with a single JSON object only. No prose.";

const LOG_PREVIEW_CHARS: usize = 2000;

/// Sampling settings for one oracle call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AskOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AskOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

impl Default for AskOptions {
    fn default() -> Self {
        Self::new(1024, 0.0)
    }
}

/// The natural-language oracle used for planning, refinement, guardrails and synthesis
pub trait Oracle: Send + Sync {
    /// Send a system prompt and a user message, return the reply text
    fn ask_text(&self, system_prompt: &str, user_message: &str, options: AskOptions)
        -> Result<String>;

    /// Options used for structured calls
    fn structured_options(&self) -> AskOptions {
        AskOptions::default()
    }

    /// Whether raw and parsed replies are debug-logged
    fn log_replies(&self) -> bool {
        false
    }

    /// Ask for a JSON object
    ///
    /// Fails with `MalformedOracleOutput` when neither the reply nor any
    /// `{...}` span inside it parses to a JSON object.
    fn ask_structured(&self, system_prompt: &str, user_message: &str) -> Result<Map<String, Value>> {
        let system = format!("{}{}", system_prompt, JSON_ONLY_INSTRUCTION);
        let raw = self.ask_text(&system, user_message, self.structured_options())?;

        if self.log_replies() {
            tracing::debug!(raw = %preview(&raw, LOG_PREVIEW_CHARS), "oracle raw reply");
        }

        match parse_reply(&raw) {
            OracleReply::Parsed(Value::Object(map)) => {
                if self.log_replies() {
                    tracing::debug!(parsed = ?map, "oracle parsed reply");
                }
                Ok(map)
            }
            OracleReply::Parsed(other) => Err(TellrError::malformed(format!(
                "expected a JSON object, got {}",
                preview(&other.to_string(), 200)
            ))),
            OracleReply::ParseError(raw) => Err(TellrError::malformed(format!(
                "model did not return valid JSON: {}",
                preview(&raw, 200)
            ))),
        }
    }
}

/// Shared handle to an oracle
pub type SharedOracle = Arc<dyn Oracle>;

/// Oracle backed by an LLM provider
pub struct LlmOracle {
    provider: SharedProvider,
    structured: AskOptions,
    log_llm: bool,
}

impl LlmOracle {
    pub fn new(provider: SharedProvider, config: &OracleConfig) -> Self {
        Self {
            provider,
            structured: AskOptions::new(config.max_tokens, config.temperature),
            log_llm: config.log_llm,
        }
    }

    /// The provider requests go to
    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }
}

impl Oracle for LlmOracle {
    fn ask_text(&self, system_prompt: &str, user_message: &str, options: AskOptions) -> Result<String> {
        let request = CompletionRequest::single(system_prompt, user_message)
            .with_max_tokens(options.max_tokens)
            .with_temperature(options.temperature);

        tracing::trace!(provider = self.provider.id(), model = %self.provider.model(), "oracle request");
        Ok(self.provider.complete(&request)?)
    }

    fn structured_options(&self) -> AskOptions {
        self.structured
    }

    fn log_replies(&self) -> bool {
        self.log_llm
    }
}

/// Oracle that is never reachable
///
/// Used when no provider is configured and in offline mode: every caller takes
/// its deterministic fallback.
#[derive(Debug, Default, Clone)]
pub struct DisabledOracle {
    reason: String,
}

impl DisabledOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Oracle for DisabledOracle {
    fn ask_text(&self, _system_prompt: &str, _user_message: &str, _options: AskOptions) -> Result<String> {
        let reason = if self.reason.is_empty() {
            "oracle disabled".to_string()
        } else {
            self.reason.clone()
        };
        Err(TellrError::Llm(LlmError::ProviderUnavailable(reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProvider, ProviderStatus};
    use parking_lot::Mutex;

    /// Provider that echoes a canned reply and remembers the last request
    struct CannedProvider {
        reply: std::result::Result<String, LlmError>,
        last: Mutex<Option<CompletionRequest>>,
    }

    impl CannedProvider {
        fn new(reply: std::result::Result<&str, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                last: Mutex::new(None),
            })
        }
    }

    impl LlmProvider for CannedProvider {
        fn id(&self) -> &str {
            "canned"
        }
        fn name(&self) -> &str {
            "Canned"
        }
        fn model(&self) -> String {
            "canned-1".to_string()
        }
        fn status(&self) -> ProviderStatus {
            ProviderStatus::Ready
        }
        fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
            *self.last.lock() = Some(request.clone());
            self.reply.clone()
        }
    }

    #[test]
    fn test_structured_appends_json_instruction() {
        let provider = CannedProvider::new(Ok(r#"{"allowed": true}"#));
        let oracle = LlmOracle::new(provider.clone(), &OracleConfig::default());

        let map = oracle.ask_structured("Classify.", "my balance").unwrap();
        assert_eq!(map["allowed"], Value::Bool(true));

        let last = provider.last.lock().clone().unwrap();
        assert!(last.system.starts_with("Classify."));
        assert!(last.system.ends_with("No prose."));
        assert_eq!(last.max_tokens, 1024);
    }

    #[test]
    fn test_structured_extracts_embedded_object() {
        let provider = CannedProvider::new(Ok("Here you go: {\"refined_query\": \"q\"} thanks"));
        let oracle = LlmOracle::new(provider, &OracleConfig::default());
        let map = oracle.ask_structured("s", "u").unwrap();
        assert_eq!(map["refined_query"], "q");
    }

    #[test]
    fn test_structured_malformed() {
        let provider = CannedProvider::new(Ok("no json here"));
        let oracle = LlmOracle::new(provider, &OracleConfig::default());
        let err = oracle.ask_structured("s", "u").unwrap_err();
        assert!(matches!(err, TellrError::MalformedOracleOutput(_)));
    }

    #[test]
    fn test_structured_rejects_non_object() {
        let provider = CannedProvider::new(Ok("[\"db\"]"));
        let oracle = LlmOracle::new(provider, &OracleConfig::default());
        assert!(matches!(
            oracle.ask_structured("s", "u"),
            Err(TellrError::MalformedOracleOutput(_))
        ));
    }

    #[test]
    fn test_transport_error_propagates() {
        let provider = CannedProvider::new(Err(LlmError::Connection("refused".to_string())));
        let oracle = LlmOracle::new(provider, &OracleConfig::default());
        assert!(matches!(
            oracle.ask_text("s", "u", AskOptions::default()),
            Err(TellrError::Llm(LlmError::Connection(_)))
        ));
    }

    #[test]
    fn test_text_uses_caller_options() {
        let provider = CannedProvider::new(Ok("An answer."));
        let oracle = LlmOracle::new(provider.clone(), &OracleConfig::default());
        let text = oracle
            .ask_text("s", "u", AskOptions::new(500, 0.2))
            .unwrap();
        assert_eq!(text, "An answer.");
        let last = provider.last.lock().clone().unwrap();
        assert_eq!(last.max_tokens, 500);
        assert_eq!(last.temperature, 0.2);
    }

    #[test]
    fn test_disabled_oracle_fails() {
        let oracle = DisabledOracle::new("offline");
        assert!(matches!(
            oracle.ask_structured("s", "u"),
            Err(TellrError::Llm(LlmError::ProviderUnavailable(_)))
        ));
    }
}
