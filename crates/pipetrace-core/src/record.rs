//! Event records - immutable snapshots of start/end notifications
//!
//! Every record carries its capture time as a fixed-width string in
//! [`TIMESTAMP_FORMAT`], so records sort chronologically by plain string
//! comparison and can be parsed back into comparable instants.

use crate::error::{TraceError, TraceResult};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Timestamp format shared by all event records (UTC, microsecond resolution)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Sentinel id marking the top of the current trace
pub const ROOT_EVENT_ID: &str = "root";

/// Category of a pipeline event
///
/// Equality and hashing go by name, so `Other("llm")` and `Llm` are the same
/// key. Prefer [`EventType::custom`] to build categories from strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventType {
    Chunking,
    NodeParsing,
    Embedding,
    /// Model invocation
    Llm,
    Query,
    Retrieve,
    Synthesize,
    Tree,
    SubQuestion,
    Templating,
    FunctionCall,
    Reranking,
    Exception,
    AgentStep,
    /// Any category not covered above
    Other(String),
}

impl EventType {
    /// Get the event type string
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Chunking => "chunking",
            EventType::NodeParsing => "node_parsing",
            EventType::Embedding => "embedding",
            EventType::Llm => "llm",
            EventType::Query => "query",
            EventType::Retrieve => "retrieve",
            EventType::Synthesize => "synthesize",
            EventType::Tree => "tree",
            EventType::SubQuestion => "sub_question",
            EventType::Templating => "templating",
            EventType::FunctionCall => "function_call",
            EventType::Reranking => "reranking",
            EventType::Exception => "exception",
            EventType::AgentStep => "agent_step",
            EventType::Other(name) => name,
        }
    }
}

impl EventType {
    /// Build a category from its name, mapping known names to their variant
    pub fn custom(name: impl Into<String>) -> Self {
        EventType::from(name.into())
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "chunking" => EventType::Chunking,
            "node_parsing" => EventType::NodeParsing,
            "embedding" => EventType::Embedding,
            "llm" => EventType::Llm,
            "query" => EventType::Query,
            "retrieve" => EventType::Retrieve,
            "synthesize" => EventType::Synthesize,
            "tree" => EventType::Tree,
            "sub_question" => EventType::SubQuestion,
            "templating" => EventType::Templating,
            "function_call" => EventType::FunctionCall,
            "reranking" => EventType::Reranking,
            "exception" => EventType::Exception,
            "agent_step" => EventType::AgentStep,
            _ => EventType::Other(s.to_string()),
        })
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        EventType::from(s.to_string())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

/// One start or end notification
///
/// Records are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    event_type: EventType,
    id: String,
    time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

impl EventRecord {
    /// Create a record stamped with the current time
    pub fn new(
        event_type: EventType,
        payload: Option<serde_json::Value>,
        id: impl Into<String>,
    ) -> Self {
        Self::with_time(event_type, payload, id, now_timestamp())
    }

    /// Create a record with an explicit, already formatted timestamp
    pub fn with_time(
        event_type: EventType,
        payload: Option<serde_json::Value>,
        id: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            id: id.into(),
            time: time.into(),
            payload,
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Formatted capture time
    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// Parse the capture time back into a comparable instant
    pub fn timestamp(&self) -> TraceResult<NaiveDateTime> {
        parse_timestamp(&self.time).map_err(|source| TraceError::InvalidTimestamp {
            event_id: self.id.clone(),
            value: self.time.clone(),
            source,
        })
    }
}

/// Capture "now" in [`TIMESTAMP_FORMAT`]
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now().naive_utc())
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}
