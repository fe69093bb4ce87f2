//! Configuration system for pipetrace
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides
//! - Validation

use crate::forwarder::DEFAULT_QUEUE_CAPACITY;
use crate::record::EventType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// No API key was supplied
    #[error("API key is missing{}", .login_url.as_ref().map(|u| format!(", please visit {}", u)).unwrap_or_default())]
    MissingApiKey { login_url: Option<String> },

    /// The API key was rejected by the validator
    #[error("API key is invalid: {0}")]
    InvalidApiKey(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete pipetrace configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Logging settings
    pub logging: LoggingSettings,

    /// Callback handler settings
    pub handler: HandlerSettings,

    /// Remote sink settings
    pub sink: SinkSettings,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Callback handler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerSettings {
    /// Render the trace tree whenever a trace ends
    pub print_trace_on_end: bool,

    /// Event types whose starts are not recorded
    pub event_starts_to_ignore: Vec<EventType>,

    /// Event types whose ends are not recorded
    pub event_ends_to_ignore: Vec<EventType>,

    /// Deepest trace-tree level rendered
    pub max_render_depth: usize,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            print_trace_on_end: true,
            event_starts_to_ignore: Vec::new(),
            event_ends_to_ignore: Vec::new(),
            max_render_depth: 64,
        }
    }
}

/// Remote sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Mirror events to the remote logging service
    pub enabled: bool,

    /// URL each event record is POSTed to
    pub log_events_url: Option<String>,

    /// Base URL of the API used to validate keys
    pub api_endpoint: String,

    /// API key identifying the user
    pub api_key: Option<String>,

    /// Where users can obtain an API key (shown when the key is missing)
    pub login_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Records queued for delivery before new ones are dropped
    pub queue_capacity: usize,

    /// Also mirror records to this JSONL file
    pub jsonl_path: Option<String>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            log_events_url: None,
            api_endpoint: "http://localhost:8000".to_string(),
            api_key: None,
            login_url: None,
            timeout_secs: 10,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            jsonl_path: None,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. PIPETRACE_CONFIG environment variable
    /// 3. <config dir>/pipetrace/config.toml
    /// 4. /etc/pipetrace/config.toml
    /// 5. Default values
    pub fn load(&self) -> ConfigResult<TracerConfig> {
        let mut config = match self.find_config_file() {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                self.load_from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                TracerConfig::default()
            }
        };

        self.apply_env_overrides(&mut config);
        self.validate(&config)?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("PIPETRACE_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("PIPETRACE_CONFIG path does not exist: {}", env_path);
        }

        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        #[cfg(unix)]
        {
            let path = PathBuf::from("/etc/pipetrace/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(&self, path: &Path) -> ConfigResult<TracerConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: TracerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut TracerConfig) {
        if let Ok(val) = std::env::var("PIPETRACE_LOG_LEVEL") {
            config.logging.log_level = val;
        }

        if let Ok(val) = std::env::var("PIPETRACE_PRINT_TRACE") {
            config.handler.print_trace_on_end =
                val.parse().unwrap_or(config.handler.print_trace_on_end);
        }

        if let Ok(val) = std::env::var("PIPETRACE_API_KEY") {
            config.sink.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("PIPETRACE_LOG_EVENTS_URL") {
            config.sink.log_events_url = Some(val);
            config.sink.enabled = true;
        }
        if let Ok(val) = std::env::var("PIPETRACE_API_ENDPOINT") {
            config.sink.api_endpoint = val;
        }
        if let Ok(val) = std::env::var("PIPETRACE_LOGIN_URL") {
            config.sink.login_url = Some(val);
        }
        if let Ok(val) = std::env::var("PIPETRACE_JSONL_PATH") {
            config.sink.jsonl_path = Some(val);
        }
    }

    /// Validate configuration
    pub fn validate(&self, config: &TracerConfig) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.logging.log_level, valid_levels
            )));
        }

        if config.handler.max_render_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_render_depth must be at least 1".to_string(),
            ));
        }

        if config.sink.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Sink queue capacity cannot be 0".to_string(),
            ));
        }

        if config.sink.enabled && config.sink.log_events_url.is_none() {
            return Err(ConfigError::ValidationError(
                "Remote sink is enabled but log_events_url is not set".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pipetrace").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TracerConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert!(config.handler.print_trace_on_end);
        assert!(!config.sink.enabled);
        assert_eq!(config.sink.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: TracerConfig = toml::from_str(
            r#"
            [logging]
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.handler.max_render_depth, 64);
    }

    #[test]
    fn test_parse_full_toml() {
        let config: TracerConfig = toml::from_str(
            r#"
            [logging]
            log_level = "warn"

            [handler]
            print_trace_on_end = false
            event_starts_to_ignore = ["chunking", "node_parsing"]
            event_ends_to_ignore = ["templating"]
            max_render_depth = 8

            [sink]
            enabled = true
            log_events_url = "https://logs.example.com/v1/events"
            api_endpoint = "https://api.example.com"
            timeout_secs = 3
            queue_capacity = 16
            jsonl_path = "/tmp/events.jsonl"
            "#,
        )
        .unwrap();

        assert!(!config.handler.print_trace_on_end);
        assert_eq!(
            config.handler.event_starts_to_ignore,
            vec![EventType::Chunking, EventType::NodeParsing]
        );
        assert_eq!(config.handler.event_ends_to_ignore, vec![EventType::Templating]);
        assert_eq!(config.sink.queue_capacity, 16);
        assert_eq!(config.sink.timeout_secs, 3);
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = TracerConfig::default();
        config.logging.log_level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::new().validate(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_enabled_sink_needs_url() {
        let mut config = TracerConfig::default();
        config.sink.enabled = true;
        assert!(ConfigLoader::new().validate(&config).is_err());

        config.sink.log_events_url = Some("http://localhost:9000/log".to_string());
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_validation_zero_queue_capacity() {
        let mut config = TracerConfig::default();
        config.sink.queue_capacity = 0;
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handler]\nmax_render_depth = 3").unwrap();

        let config = ConfigLoader::new().load_from_file(file.path()).unwrap();
        assert_eq!(config.handler.max_render_depth, 3);
    }

    #[test]
    fn test_load_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handler\nmax_render_depth = ").unwrap();

        assert!(matches!(
            ConfigLoader::new().load_from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_api_key_message_includes_login_url() {
        let err = ConfigError::MissingApiKey {
            login_url: Some("https://example.com/login".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "API key is missing, please visit https://example.com/login"
        );
        let bare = ConfigError::MissingApiKey { login_url: None };
        assert_eq!(bare.to_string(), "API key is missing");
    }

    #[test]
    fn test_serialize_config() {
        let config = TracerConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: TracerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.sink.queue_capacity, config.sink.queue_capacity);
    }
}
