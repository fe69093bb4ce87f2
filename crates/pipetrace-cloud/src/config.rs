//! Connection settings for the logging service
//!
//! Derived from the `[sink]` section of the main configuration, or read
//! straight from the environment.

use pipetrace_core::config::SinkSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Logging service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// REST API endpoint (key validation)
    pub api_endpoint: String,

    /// URL each event record is POSTed to
    pub log_events_url: Option<String>,

    /// API key
    pub api_key: Option<String>,

    /// Where users can obtain an API key
    pub login_url: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "http://localhost:8000".to_string(),
            log_events_url: None,
            api_key: None,
            login_url: None,
            timeout_ms: 10_000,
        }
    }
}

impl CloudConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PIPETRACE_API_ENDPOINT") {
            config.api_endpoint = val;
        }
        if let Ok(val) = std::env::var("PIPETRACE_LOG_EVENTS_URL") {
            config.log_events_url = Some(val);
        }
        if let Ok(val) = std::env::var("PIPETRACE_API_KEY") {
            config.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("PIPETRACE_LOGIN_URL") {
            config.login_url = Some(val);
        }

        config
    }

    /// Convert from the `[sink]` settings
    pub fn from_sink_settings(sink: &SinkSettings) -> Self {
        Self {
            api_endpoint: sink.api_endpoint.clone(),
            log_events_url: sink.log_events_url.clone(),
            api_key: sink.api_key.clone(),
            login_url: sink.login_url.clone(),
            timeout_ms: sink.timeout_secs.saturating_mul(1000),
        }
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
