//! Error types for pipetrace-cloud crate

use pipetrace_core::{ConfigError, SinkError};
use thiserror::Error;

/// Errors that can occur talking to the logging service
#[derive(Debug, Error)]
pub enum CloudError {
    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// API key rejected
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Rate limited by server
    #[error("Rate limited: retry after {0}s")]
    RateLimited(u64),

    /// Server error
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CloudError {
    /// Create a server error from status and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        CloudError::Server {
            status,
            message: message.into(),
        }
    }
}

impl From<CloudError> for SinkError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Server { status, message } => SinkError::Status {
                status,
                body: message,
            },
            CloudError::RateLimited(secs) => SinkError::Status {
                status: 429,
                body: format!("retry after {}s", secs),
            },
            CloudError::Auth(message) => SinkError::Status {
                status: 401,
                body: message,
            },
            CloudError::InvalidApiKey => SinkError::Status {
                status: 403,
                body: "invalid API key".to_string(),
            },
            CloudError::Serialization(e) => SinkError::Serialization(e),
            other => SinkError::Network(other.to_string()),
        }
    }
}

impl From<CloudError> for ConfigError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Config(message) => ConfigError::ValidationError(message),
            other => ConfigError::InvalidApiKey(other.to_string()),
        }
    }
}

/// Result type for cloud operations
pub type CloudResult<T> = Result<T, CloudError>;
