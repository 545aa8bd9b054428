//! Configuration loader with environment variable expansion
//!
//! Loads configuration from `.tellr.toml` in the working directory or the user
//! config directory, then applies environment overrides.

use super::types::{ProviderConfig, TellrConfig};
use regex::Regex;
use std::path::{Path, PathBuf};

const ENV_VAR_PATTERN: &str = r"\$\{([^}]+)\}";

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid expansion pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Load configuration from various sources
///
/// Priority order:
/// 1. `explicit` path, when given
/// 2. Project-level `.tellr.toml`
/// 3. User-level `~/.config/tellr/config.toml`
/// 4. Default configuration
///
/// Environment overrides apply on top of whichever source won.
pub fn load_config(project_dir: &Path, explicit: Option<&Path>) -> Result<TellrConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_file(path);
    }

    let project_config = project_dir.join(".tellr.toml");
    if project_config.exists() {
        return load_from_file(&project_config);
    }

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            return load_from_file(&user_config);
        }
    }

    Ok(apply_env_overrides(TellrConfig::default(), env_lookup))
}

/// Get user config file path
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tellr").join("config.toml"))
}

/// Load configuration from a specific file
fn load_from_file(path: &Path) -> Result<TellrConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, env_lookup)
}

/// Parse TOML, expand `${VAR}` references and apply overrides using `lookup`
pub(crate) fn parse_config<F>(content: &str, lookup: F) -> Result<TellrConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: TellrConfig = toml::from_str(content)?;
    let regex = Regex::new(ENV_VAR_PATTERN)?;
    expand_env_vars(&mut config, &regex, &lookup);
    Ok(apply_env_overrides(config, lookup))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Expand ${VAR} patterns in string values
fn expand_env_vars<F>(config: &mut TellrConfig, regex: &Regex, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let expand = |value: &mut Option<String>| {
        if let Some(s) = value.as_deref() {
            *value = Some(expand_string(s, regex, lookup));
        }
    };

    for provider in config.llm.providers.values_mut() {
        expand(&mut provider.api_key);
        expand(&mut provider.base_url);
    }
    expand(&mut config.database.url);
    expand(&mut config.database.api_key);
    expand(&mut config.search.api_key);
}

/// Expand environment variables in a single string
fn expand_string<F>(s: &str, regex: &Regex, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    regex
        .replace_all(s, |caps: &regex::Captures| {
            let var_name = &caps[1];
            lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
        })
        .to_string()
}

/// Apply environment variable overrides for common settings
///
/// Supports direct environment variables:
/// - ANTHROPIC_API_KEY -> claude.api_key
/// - OPENAI_API_KEY -> openai.api_key
/// - OLLAMA_BASE_URL -> ollama.base_url
/// - TELLR_DEFAULT_PROVIDER -> llm.default_provider
/// - SUPABASE_URL / SUPABASE_ANON_KEY / DB_DEFAULT_TABLE -> database
/// - TAVILY_API_KEY -> search.api_key
/// - LOG_LLM -> oracle.log_llm
/// - HOST / PORT -> server
fn apply_env_overrides<F>(mut config: TellrConfig, lookup: F) -> TellrConfig
where
    F: Fn(&str) -> Option<String>,
{
    for (env_var, provider_id) in [("ANTHROPIC_API_KEY", "claude"), ("OPENAI_API_KEY", "openai")] {
        if let Some(key) = lookup(env_var) {
            let provider = config
                .llm
                .providers
                .entry(provider_id.to_string())
                .or_insert_with(ProviderConfig::default);
            provider.api_key = Some(key);
            provider.enabled = true;
        }
    }

    if let Some(url) = lookup("OLLAMA_BASE_URL") {
        let provider = config
            .llm
            .providers
            .entry("ollama".to_string())
            .or_insert_with(ProviderConfig::default);
        provider.base_url = Some(url);
    }

    if let Some(provider) = lookup("TELLR_DEFAULT_PROVIDER") {
        config.llm.default_provider = provider;
    }

    if let Some(url) = lookup("SUPABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(key) = lookup("SUPABASE_ANON_KEY") {
        config.database.api_key = Some(key);
    }
    if let Some(table) = lookup("DB_DEFAULT_TABLE") {
        config.database.default_table = table;
    }

    if let Some(key) = lookup("TAVILY_API_KEY") {
        config.search.api_key = Some(key);
    }

    if let Some(flag) = lookup("LOG_LLM") {
        config.oracle.log_llm = is_truthy(&flag);
    }

    if let Some(host) = lookup("HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }

    config
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Create a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# tellr Configuration
# Place this file in your working directory as .tellr.toml
# or in ~/.config/tellr/config.toml for global settings

[llm]
# Default provider: claude, openai, ollama
default_provider = "claude"

# Request timeout in seconds
timeout = 120

[llm.providers.claude]
enabled = true
api_key = "${ANTHROPIC_API_KEY}"
default_model = "claude-3-5-sonnet-20240620"

[llm.providers.openai]
enabled = false
api_key = "${OPENAI_API_KEY}"
default_model = "gpt-4o"

[llm.providers.ollama]
enabled = false
base_url = "http://localhost:11434"
default_model = "llama3"

[oracle]
max_tokens = 1024
temperature = 0.0
synthesis_max_tokens = 500
synthesis_temperature = 0.2
# Debug-log raw oracle replies (also LOG_LLM=1)
log_llm = false

[database]
url = "${SUPABASE_URL}"
api_key = "${SUPABASE_ANON_KEY}"
default_table = "wellsdummydata"
row_limit = 500

[search]
api_key = "${TAVILY_API_KEY}"
max_results = 5
search_depth = "advanced"

[server]
host = "127.0.0.1"
port = 5001
event_history = 500
"#
}
