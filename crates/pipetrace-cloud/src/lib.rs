//! pipetrace-cloud - HTTP logging service connector
//!
//! Mirrors recorded events to a remote logging service and resolves API
//! keys to user ids.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipetrace_cloud::{ApiKeyAuthenticator, CloudConfig, CloudSink};
//! use pipetrace_core::{CallbackHandler, HandlerSettings, SinkForwarder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CloudConfig {
//!         log_events_url: Some("https://logs.example.com/v1/events".to_string()),
//!         ..CloudConfig::from_env()
//!     };
//!
//!     let sink = Arc::new(CloudSink::new(&config)?);
//!     let handler = CallbackHandler::new(HandlerSettings::default())
//!         .with_forwarder(SinkForwarder::spawn(sink, 1024));
//!
//!     let auth = ApiKeyAuthenticator::new(&config)?;
//!     handler.set_api_key(config.api_key.as_deref(), &auth).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod sink;
pub mod types;

pub use client::HttpClient;
pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use sink::{ApiKeyAuthenticator, CloudSink};
