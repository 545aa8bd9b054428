//! Provider registry for managing multiple LLM providers

use super::{ClaudeProvider, LlmError, OllamaProvider, OpenAIProvider, ProviderStatus, SharedProvider};
use crate::config::{ProviderConfig, TellrConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for managing multiple LLM providers
pub struct ProviderRegistry {
    /// All registered providers
    providers: HashMap<String, SharedProvider>,

    /// Preferred provider ID
    active_provider: String,

    /// Fallback chain for automatic failover
    fallback_chain: Vec<String>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            active_provider: String::new(),
            fallback_chain: Vec::new(),
        }
    }

    /// Create a registry from configuration
    ///
    /// Every enabled provider is constructed and registered. The fallback chain
    /// is sorted so failover order does not depend on map iteration.
    pub fn from_config(config: &TellrConfig) -> Self {
        let mut registry = Self::new();
        registry.active_provider = config.llm.default_provider.clone();

        let mut enabled: Vec<(&String, &ProviderConfig)> = config.enabled_providers();
        enabled.sort_by(|a, b| a.0.cmp(b.0));

        for (id, provider_config) in enabled {
            if let Some(provider) = build_provider(id, provider_config, config.llm.timeout) {
                registry.fallback_chain.push(id.clone());
                registry.register(provider);
            } else {
                tracing::warn!(provider = %id, "unknown LLM provider in config, skipping");
            }
        }

        registry
    }

    /// Register a provider
    pub fn register(&mut self, provider: SharedProvider) {
        let id = provider.id().to_string();
        if self.active_provider.is_empty() {
            self.active_provider = id.clone();
        }
        self.providers.insert(id, provider);
    }

    /// Get a provider by ID
    pub fn get(&self, id: &str) -> Option<SharedProvider> {
        self.providers.get(id).cloned()
    }

    /// Get active provider ID
    pub fn active_id(&self) -> &str {
        &self.active_provider
    }

    /// Get the preferred provider, or the first ready provider in the fallback chain
    pub fn resolve(&self) -> Result<SharedProvider, LlmError> {
        self.get_with_fallback(&self.active_provider)
            .ok_or_else(|| {
                LlmError::ProviderUnavailable(format!(
                    "no ready LLM provider (preferred: {})",
                    self.active_provider
                ))
            })
    }

    /// Get a provider with automatic fallback
    pub fn get_with_fallback(&self, id: &str) -> Option<SharedProvider> {
        // Try the requested provider first
        if let Some(provider) = self.get(id) {
            if provider.status() == ProviderStatus::Ready {
                return Some(provider);
            }
        }

        // Try fallback chain
        for fallback_id in &self.fallback_chain {
            if let Some(provider) = self.get(fallback_id) {
                if provider.status() == ProviderStatus::Ready {
                    return Some(provider);
                }
            }
        }

        None
    }

    /// Get display info for all providers
    pub fn provider_info(&self) -> Vec<ProviderInfo> {
        let mut info: Vec<ProviderInfo> = self
            .providers
            .values()
            .map(|p| ProviderInfo {
                id: p.id().to_string(),
                name: p.name().to_string(),
                model: p.model(),
                status: p.status(),
            })
            .collect();
        info.sort_by(|a, b| a.id.cmp(&b.id));
        info
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_provider(id: &str, config: &ProviderConfig, timeout: u64) -> Option<SharedProvider> {
    let api_key = config.api_key.as_deref().unwrap_or("");
    let provider: SharedProvider = match id {
        "claude" | "anthropic" => {
            let model = config
                .default_model
                .as_deref()
                .unwrap_or("claude-3-5-sonnet-20240620");
            let mut provider = ClaudeProvider::new(api_key, model, timeout);
            if let Some(url) = config.base_url.as_deref() {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        "openai" => {
            let model = config.default_model.as_deref().unwrap_or("gpt-4o");
            let mut provider = OpenAIProvider::new(api_key, model, timeout);
            if let Some(url) = config.base_url.as_deref() {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        "ollama" => {
            let url = config
                .base_url
                .as_deref()
                .unwrap_or("http://localhost:11434");
            let model = config.default_model.as_deref().unwrap_or("llama3");
            Arc::new(OllamaProvider::new(url, model, timeout))
        }
        _ => return None,
    };
    Some(provider)
}

/// Provider information for display
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub model: String,
    pub status: ProviderStatus,
}

impl ProviderInfo {
    /// Get a display string for the provider
    pub fn display(&self) -> String {
        format!("{} ({})", self.name, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(ids: &[(&str, Option<&str>)]) -> TellrConfig {
        let mut config = TellrConfig::default();
        config.llm.providers.clear();
        for (id, key) in ids {
            config.llm.providers.insert(
                id.to_string(),
                ProviderConfig {
                    enabled: true,
                    api_key: key.map(|k| k.to_string()),
                    base_url: None,
                    default_model: None,
                },
            );
        }
        config
    }

    #[test]
    fn test_default_config_has_no_ready_provider() {
        let registry = ProviderRegistry::from_config(&TellrConfig::default());
        assert!(registry.resolve().is_err());
    }

    #[test]
    fn test_resolve_preferred() {
        let registry = ProviderRegistry::from_config(&config_with(&[("claude", Some("sk"))]));
        let provider = registry.resolve().unwrap();
        assert_eq!(provider.id(), "claude");
    }

    #[test]
    fn test_resolve_falls_back_when_preferred_has_no_key() {
        let registry = ProviderRegistry::from_config(&config_with(&[
            ("claude", None),
            ("openai", Some("sk")),
        ]));
        assert_eq!(registry.active_id(), "claude");
        let provider = registry.resolve().unwrap();
        assert_eq!(provider.id(), "openai");
    }

    #[test]
    fn test_unknown_provider_is_skipped() {
        let registry = ProviderRegistry::from_config(&config_with(&[("mystery", Some("k"))]));
        assert!(registry.provider_info().is_empty());
    }

    #[test]
    fn test_provider_info_display() {
        let registry = ProviderRegistry::from_config(&config_with(&[("openai", Some("sk"))]));
        let info = registry.provider_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].display(), "OpenAI (gpt-4o)");
    }
}
