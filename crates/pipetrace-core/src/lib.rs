//! pipetrace core - event correlation and trace reconstruction
//!
//! This crate provides the in-process engine behind pipetrace:
//!
//! - **Records**: immutable start/end notifications with sortable timestamps
//! - **Index**: by-type, by-id and sequential views kept in lockstep
//! - **Pairing**: grouping events by id and ordering groups by start time
//! - **Stats**: total/average/count timing rollups over pairs
//! - **Trace**: trace maps and depth-first tree rendering
//! - **Sink**: collaborator traits and the best-effort forwarder
//! - **Handler**: the caller-owned context tying these together

pub mod config;
pub mod error;
pub mod forwarder;
pub mod handler;
pub mod index;
pub mod pairing;
pub mod record;
pub mod session;
pub mod sink;
pub mod stats;
pub mod trace;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, ConfigResult, HandlerSettings, TracerConfig};
pub use error::{SinkError, SinkResult, TraceError, TraceResult};
pub use forwarder::{ForwarderStats, SinkForwarder};
pub use handler::CallbackHandler;
pub use index::EventIndex;
pub use pairing::{pair_events, EventPair};
pub use record::{EventRecord, EventType, ROOT_EVENT_ID, TIMESTAMP_FORMAT};
pub use session::SessionId;
pub use sink::{ApiKeyValidator, FanoutSink, RemoteSink, SessionContext, SinkRecord};
pub use stats::{time_stats, EventStats};
pub use trace::{TraceLine, TraceMap};

/// pipetrace version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
