//! Error types for correlation, statistics and sink delivery

use thiserror::Error;

/// Errors raised by pairing and timing operations
#[derive(Debug, Error)]
pub enum TraceError {
    /// A stored record's timestamp could not be parsed
    #[error("Invalid timestamp {value:?} on event {event_id:?}: {source}")]
    InvalidTimestamp {
        event_id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Statistics were requested over zero event pairs
    #[error("No events to compute statistics over")]
    NoEvents,
}

/// Result type for correlation operations
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors raised while forwarding a record to a remote sink.
///
/// These never reach the caller of a notification; the forwarder logs them.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Sink rejected record with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink is closed")]
    Closed,
}

pub type SinkResult<T> = Result<T, SinkError>;
