//! Collaborator traits for mirroring events off-process
//!
//! A [`RemoteSink`] receives one [`SinkRecord`] per recorded event. An
//! [`ApiKeyValidator`] resolves the caller's API key to a user id once at
//! setup. Concrete implementations live in other crates.

use crate::config::ConfigError;
use crate::error::SinkResult;
use crate::record::EventRecord;
use crate::session::SessionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who and what a record belongs to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub session_id: Option<SessionId>,
    /// Label of the active trace
    pub trace_type: Option<String>,
}

/// Wire shape of one mirrored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub trace_type: Option<String>,
    pub event_type: String,
    /// Parent event id; the event's own id when it has no parent
    pub parent_id: String,
    pub event_id: String,
    pub event_time: String,
    pub event_payload: serde_json::Value,
}

impl SinkRecord {
    pub fn from_event(event: &EventRecord, parent_id: &str, context: &SessionContext) -> Self {
        let parent_id = if parent_id.is_empty() {
            event.id()
        } else {
            parent_id
        };

        Self {
            user_id: context.user_id.clone(),
            session_id: context.session_id.as_ref().map(|s| s.as_str().to_string()),
            trace_type: context.trace_type.clone(),
            event_type: event.event_type().to_string(),
            parent_id: parent_id.to_string(),
            event_id: event.id().to_string(),
            event_time: event.time().to_string(),
            event_payload: event.payload().cloned().unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Destination for mirrored events
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Sink name, used in logs
    fn name(&self) -> &str;

    /// Deliver one record. Called at most once per record.
    async fn send(&self, record: &SinkRecord) -> SinkResult<()>;

    /// Flush any buffered records
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}

/// Resolves an API key to the owning user's id
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn validate(&self, api_key: &str) -> Result<String, ConfigError>;
}

/// Sends every record to each inner sink in turn
///
/// All sinks are attempted; the first failure is returned.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn RemoteSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn RemoteSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl RemoteSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn send(&self, record: &SinkRecord) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(record).await {
                tracing::debug!("Sink {} failed: {}", sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn flush(&self) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}
