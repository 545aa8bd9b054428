//! LLM error types

use std::fmt;

/// Error type for LLM operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network/connection error
    Connection(String),

    /// API error (authentication, bad request, server failure)
    Api { status: u16, message: String },

    /// Provider not available (disabled, missing credentials, not registered)
    ProviderUnavailable(String),

    /// Rate limited
    RateLimited { retry_after: Option<u64> },

    /// The provider answered with a body we could not read
    InvalidResponse(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Connection(msg) => write!(f, "Connection error: {}", msg),
            LlmError::Api { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            LlmError::ProviderUnavailable(provider) => {
                write!(f, "Provider unavailable: {}", provider)
            }
            LlmError::RateLimited { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limited, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limited")
                }
            }
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<ureq::Error> for LlmError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let retry_after = response
                    .header("retry-after")
                    .and_then(|v| v.parse::<u64>().ok());
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());
                if status == 429 {
                    LlmError::RateLimited { retry_after }
                } else if status == 401 || status == 403 {
                    LlmError::Api {
                        status,
                        message: "Authentication failed".to_string(),
                    }
                } else {
                    LlmError::Api { status, message }
                }
            }
            ureq::Error::Transport(transport) => LlmError::Connection(transport.to_string()),
        }
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(format!("JSON error: {}", err))
    }
}
