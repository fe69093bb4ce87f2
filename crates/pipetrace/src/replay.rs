//! Notification files and replaying them through a handler
//!
//! A notification file is JSONL, one callback per line:
//!
//! ```text
//! {"kind":"trace_start","trace_id":"query"}
//! {"kind":"event_start","event_type":"llm","event_id":"e1","parent_id":"root"}
//! {"kind":"event_end","event_type":"llm","event_id":"e1"}
//! {"kind":"trace_end","trace_id":"query","trace_map":{"root":["e1"]}}
//! ```
//!
//! Events may carry a `time` in the recorded timestamp format; otherwise
//! they are stamped when replayed.

use anyhow::Context;
use pipetrace_core::{CallbackHandler, EventRecord, EventStats, EventType, TraceMap};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// One callback from an instrumented pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    EventStart {
        event_type: EventType,
        event_id: String,
        #[serde(default)]
        parent_id: String,
        #[serde(default)]
        payload: Option<serde_json::Value>,
        #[serde(default)]
        time: Option<String>,
    },
    EventEnd {
        event_type: EventType,
        event_id: String,
        #[serde(default)]
        payload: Option<serde_json::Value>,
        #[serde(default)]
        time: Option<String>,
    },
    TraceStart {
        #[serde(default)]
        trace_id: Option<String>,
    },
    TraceEnd {
        #[serde(default)]
        trace_id: Option<String>,
        #[serde(default)]
        trace_map: Option<TraceMap>,
    },
}

/// Read every notification in a JSONL file, skipping blank lines
pub fn read_notifications(path: &Path) -> anyhow::Result<Vec<Notification>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut notifications = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let notification = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed notification", path.display(), n + 1))?;
        notifications.push(notification);
    }

    debug!("Read {} notifications from {:?}", notifications.len(), path);
    Ok(notifications)
}

/// Deliver one notification to the handler
pub fn apply(handler: &CallbackHandler, notification: &Notification) {
    match notification {
        Notification::EventStart {
            event_type,
            event_id,
            parent_id,
            payload,
            time,
        } => {
            let record = build_record(event_type, payload, event_id, time);
            handler.record_start(record, parent_id);
        }
        Notification::EventEnd {
            event_type,
            event_id,
            payload,
            time,
        } => {
            let record = build_record(event_type, payload, event_id, time);
            handler.record_end(record);
        }
        Notification::TraceStart { trace_id } => handler.start_trace(trace_id.as_deref()),
        Notification::TraceEnd {
            trace_id,
            trace_map,
        } => handler.end_trace(trace_id.as_deref(), trace_map.clone()),
    }
}

fn build_record(
    event_type: &EventType,
    payload: &Option<serde_json::Value>,
    event_id: &str,
    time: &Option<String>,
) -> EventRecord {
    match time {
        Some(time) => EventRecord::with_time(event_type.clone(), payload.clone(), event_id, time),
        None => EventRecord::new(event_type.clone(), payload.clone(), event_id),
    }
}

/// Timing statistics per recorded event type, ordered by type name.
///
/// With a filter, only that type is reported (and nothing if it was never
/// recorded).
pub fn stats_by_type(
    handler: &CallbackHandler,
    filter: Option<&EventType>,
) -> anyhow::Result<Vec<(EventType, EventStats)>> {
    let mut types: Vec<EventType> = handler
        .event_pairs_by_type()
        .into_keys()
        .filter(|t| filter.map_or(true, |f| f == t))
        .collect();
    types.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    types
        .into_iter()
        .map(|t| {
            let stats = handler
                .get_event_time_info(Some(&t))
                .with_context(|| format!("Failed to time {} events", t))?;
            Ok((t, stats))
        })
        .collect()
}

/// Render a stats table
pub fn format_stats(rows: &[(EventType, EventStats)]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:>6} {:>14} {:>14}\n",
        "event_type", "count", "total_secs", "average_secs"
    ));
    for (event_type, stats) in rows {
        out.push_str(&format!(
            "{:<16} {:>6} {:>14.6} {:>14.6}\n",
            event_type.as_str(),
            stats.count,
            stats.total_seconds,
            stats.average_seconds
        ));
    }
    out
}
