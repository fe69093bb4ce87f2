//! pipetrace-export - local sinks for mirrored events
//!
//! Currently a single JSONL sink that appends one record per line.

pub mod jsonl;

pub use jsonl::{JsonlSink, JsonlSinkConfig};
