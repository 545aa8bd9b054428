//! Error types for tellr Core
//!
//! Provides a unified error type for all backend operations.

use crate::capabilities::Capability;
use thiserror::Error;

/// Result type for tellr Core operations
pub type Result<T> = std::result::Result<T, TellrError>;

/// Unified error type for tellr Core
#[derive(Error, Debug)]
pub enum TellrError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Oracle transport error (network, credentials, provider status)
    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    /// The oracle answered, but not with a usable JSON object
    #[error("Malformed oracle output: {0}")]
    MalformedOracleOutput(String),

    /// A capability adapter reported a failure
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input from the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TellrError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TellrError::Config(msg.into())
    }

    /// Create a malformed-output error
    pub fn malformed(msg: impl Into<String>) -> Self {
        TellrError::MalformedOracleOutput(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        TellrError::InvalidInput(msg.into())
    }
}

impl From<serde_json::Error> for TellrError {
    fn from(err: serde_json::Error) -> Self {
        TellrError::Serialization(err.to_string())
    }
}

impl From<crate::config::ConfigError> for TellrError {
    fn from(err: crate::config::ConfigError) -> Self {
        TellrError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for TellrError {
    fn from(err: toml::de::Error) -> Self {
        TellrError::Config(err.to_string())
    }
}

/// Failure reported by a capability adapter.
///
/// This is the typed form of the `{error: ...}` marker: the message is shown to
/// the user verbatim when it ends a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CapabilityError {
    pub capability: Capability,
    pub message: String,
}

impl CapabilityError {
    pub fn new(capability: Capability, message: impl Into<String>) -> Self {
        Self {
            capability,
            message: message.into(),
        }
    }
}
