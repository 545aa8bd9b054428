//! Configuration module for tellr
//!
//! Handles loading and parsing of `.tellr.toml` configuration files
//! with support for environment variable expansion.

mod loader;
mod types;

pub use loader::{load_config, sample_config, user_config_path, ConfigError};
pub use types::{
    DatabaseConfig, LlmConfig, OracleConfig, ProviderConfig, SearchConfig, ServerConfig,
    TellrConfig,
};
