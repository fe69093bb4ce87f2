//! Wire types for the logging service API

use serde::{Deserialize, Serialize};

/// Response to an API key validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateKeyResponse {
    /// User owning the key
    pub user_id: String,
}

/// Error body returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,

    /// Error message
    pub message: String,

    /// Optional details
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub(crate) fn unknown() -> Self {
        Self {
            code: "unknown".to_string(),
            message: "Unknown error".to_string(),
            details: None,
        }
    }
}
