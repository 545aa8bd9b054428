//! Configuration types for tellr
//!
//! Defines the structure of `.tellr.toml` configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TellrConfig {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Oracle call settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Row backend used by the db and viz capabilities
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP front end
    #[serde(default)]
    pub server: ServerConfig,
}

/// LLM configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default provider to use (claude, openai, ollama)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "claude".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout: default_timeout(),
            providers: default_providers(),
        }
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether this provider is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL for the API
    #[serde(default)]
    pub base_url: Option<String>,

    /// Default model for this provider
    #[serde(default)]
    pub default_model: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            default_model: None,
        }
    }
}

/// Create default provider configurations
fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();

    // Claude - requires API key
    providers.insert(
        "claude".to_string(),
        ProviderConfig {
            enabled: false, // Disabled by default until API key is set
            api_key: None,
            base_url: Some("https://api.anthropic.com".to_string()),
            default_model: Some("claude-3-5-sonnet-20240620".to_string()),
        },
    );

    // OpenAI - requires API key
    providers.insert(
        "openai".to_string(),
        ProviderConfig {
            enabled: false,
            api_key: None,
            base_url: Some("https://api.openai.com/v1".to_string()),
            default_model: Some("gpt-4o".to_string()),
        },
    );

    // Ollama - local, opt-in
    providers.insert(
        "ollama".to_string(),
        ProviderConfig {
            enabled: false,
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            default_model: Some("llama3".to_string()),
        },
    );

    providers
}

/// Oracle call settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Token budget for structured (JSON) calls
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for structured calls
    #[serde(default)]
    pub temperature: f32,

    /// Token budget for the final synthesized answer
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,

    /// Sampling temperature for the final synthesized answer
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    /// Debug-log raw and parsed oracle replies
    #[serde(default)]
    pub log_llm: bool,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_synthesis_max_tokens() -> u32 {
    500
}

fn default_synthesis_temperature() -> f32 {
    0.2
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            synthesis_max_tokens: default_synthesis_max_tokens(),
            synthesis_temperature: default_synthesis_temperature(),
            log_llm: false,
        }
    }
}

/// Row backend configuration (PostgREST / Supabase)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Anonymous API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table queried by the db and viz capabilities
    #[serde(default = "default_table")]
    pub default_table: String,

    /// Upper bound on rows fetched per capability call
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
}

fn default_table() -> String {
    "wellsdummydata".to_string()
}

fn default_row_limit() -> usize {
    500
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            default_table: default_table(),
            row_limit: default_row_limit(),
        }
    }
}

/// Web search configuration (Tavily)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_depth")]
    pub search_depth: String,
}

fn default_search_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_url(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
        }
    }
}

/// HTTP front end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Capacity of the in-memory event history
    #[serde(default = "default_event_history")]
    pub event_history: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_event_history() -> usize {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_history: default_event_history(),
        }
    }
}

impl TellrConfig {
    /// Get a provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.llm.providers.get(name)
    }

    /// Get the default provider config
    pub fn default_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider(&self.llm.default_provider)
    }

    /// Get all enabled providers
    pub fn enabled_providers(&self) -> Vec<(&String, &ProviderConfig)> {
        self.llm
            .providers
            .iter()
            .filter(|(_, config)| config.enabled)
            .collect()
    }
}
