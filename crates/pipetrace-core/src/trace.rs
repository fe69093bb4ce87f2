//! Trace maps and trace-tree rendering
//!
//! A trace map is an adjacency list from parent event id to ordered child
//! ids. It is supplied from outside when a trace ends and may be
//! disconnected from what was actually recorded: nodes with no recorded
//! events print nothing, but their children are still visited.

use crate::index::EventIndex;
use crate::pairing::EventPair;
use crate::record::{EventType, ROOT_EVENT_ID};
use crate::stats::time_stats;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use tracing::warn;

/// Width of the separator line bracketing a trace dump
const SEPARATOR_WIDTH: usize = 15;

/// Parent event id -> ordered child event ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceMap {
    children: HashMap<String, Vec<String>>,
}

impl TraceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child to a parent's list
    pub fn add_child(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.children
            .entry(parent.into())
            .or_default()
            .push(child.into());
    }

    /// Children of a node; empty if the node has no entry
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }
}

impl From<HashMap<String, Vec<String>>> for TraceMap {
    fn from(children: HashMap<String, Vec<String>>) -> Self {
        Self { children }
    }
}

impl FromIterator<(String, Vec<String>)> for TraceMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().collect(),
        }
    }
}

/// The active trace label and its map
///
/// Lifecycle: idle -> active (`start`) -> map installed (`end`) -> idle.
/// Calling `end` without `start` just installs the map.
#[derive(Debug, Default)]
pub struct TraceState {
    trace_id: Option<String>,
    map: TraceMap,
}

impl TraceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new trace, discarding any in-flight map
    pub fn start(&mut self, trace_id: Option<&str>) {
        self.map.clear();
        self.trace_id = trace_id.map(str::to_string);
    }

    /// Install the map computed for the finished trace
    pub fn end(&mut self, trace_map: Option<TraceMap>) {
        self.map = trace_map.unwrap_or_default();
    }

    pub fn reset_map(&mut self) {
        self.map.clear();
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn map(&self) -> &TraceMap {
        &self.map
    }
}

/// One rendered node of the trace tree
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLine {
    pub depth: usize,
    pub event_id: String,
    pub event_type: EventType,
    pub total_seconds: f64,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:indent$}|_{} -> {:?} seconds",
            "",
            self.event_type,
            self.total_seconds,
            indent = self.depth * 2
        )
    }
}

/// Depth-first, pre-order walk of `map` from the root sentinel.
///
/// Each node's duration comes from its by-id group in `index`. Every id is
/// rendered at most once, at its first position in walk order, so cyclic
/// and heavily shared maps cost one visit per id. Nothing deeper than
/// `max_depth` is visited.
pub fn render_trace(map: &TraceMap, index: &EventIndex, max_depth: usize) -> Vec<TraceLine> {
    let mut lines = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, usize)> = vec![(ROOT_EVENT_ID, 1)];

    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id) {
            warn!("Trace node {} reached more than once, rendering it once", id);
            continue;
        }

        if let Some(line) = render_node(index, id, depth) {
            lines.push(line);
        }

        let children = map.children(id);
        if children.is_empty() {
            continue;
        }
        if depth >= max_depth {
            warn!(
                "Trace map deeper than {} levels, not descending below {}",
                max_depth, id
            );
            continue;
        }

        // Reversed so the first child is popped first
        stack.extend(children.iter().rev().map(|c| (c.as_str(), depth + 1)));
    }

    lines
}

fn render_node(index: &EventIndex, id: &str, depth: usize) -> Option<TraceLine> {
    let pair = EventPair::new(index.by_id(id))?;
    match time_stats(std::slice::from_ref(&pair)) {
        Ok(stats) => Some(TraceLine {
            depth,
            event_id: id.to_string(),
            event_type: pair.first().event_type().clone(),
            total_seconds: stats.total_seconds,
        }),
        Err(e) => {
            warn!("Skipping trace node {}: {}", id, e);
            None
        }
    }
}

/// Write a trace dump: separator, header, one line per node, separator
pub fn write_trace_dump<W: Write>(
    out: &mut W,
    trace_id: Option<&str>,
    lines: &[TraceLine],
) -> io::Result<()> {
    let separator = "*".repeat(SEPARATOR_WIDTH);
    writeln!(out, "{}", separator)?;
    writeln!(out, "Trace: {}", trace_id.unwrap_or("None"))?;
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", separator)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventRecord;

    fn record_pair(index: &EventIndex, id: &str, t: &str, start: &str, end: &str) {
        index.insert(EventRecord::with_time(EventType::from(t), None, id, start));
        index.insert(EventRecord::with_time(EventType::from(t), None, id, end));
    }

    fn sample_index() -> EventIndex {
        let index = EventIndex::new();
        record_pair(
            &index,
            "a",
            "chain",
            "2024-01-01 00:00:00.000000",
            "2024-01-01 00:00:01.000000",
        );
        record_pair(
            &index,
            "b",
            "llm",
            "2024-01-01 00:00:00.100000",
            "2024-01-01 00:00:00.600000",
        );
        record_pair(
            &index,
            "c",
            "llm",
            "2024-01-01 00:00:00.600000",
            "2024-01-01 00:00:00.850000",
        );
        index
    }

    fn sample_map() -> TraceMap {
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "a");
        map.add_child("a", "b");
        map.add_child("a", "c");
        map
    }

    #[test]
    fn test_render_walks_depth_first_in_map_order() {
        let lines = render_trace(&sample_map(), &sample_index(), 64);
        let summary: Vec<_> = lines
            .iter()
            .map(|l| (l.event_id.as_str(), l.depth, l.total_seconds))
            .collect();
        assert_eq!(summary, vec![("a", 2, 1.0), ("b", 3, 0.5), ("c", 3, 0.25)]);
        assert_eq!(lines[0].event_type, EventType::Other("chain".to_string()));
        assert_eq!(lines[1].event_type, EventType::Llm);
    }

    #[test]
    fn test_line_format_indents_two_spaces_per_level() {
        let lines = render_trace(&sample_map(), &sample_index(), 64);
        let rendered: Vec<String> = lines.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "    |_chain -> 1.0 seconds",
                "      |_llm -> 0.5 seconds",
                "      |_llm -> 0.25 seconds",
            ]
        );
    }

    #[test]
    fn test_unrecorded_nodes_still_visit_children() {
        let index = sample_index();
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "ghost");
        map.add_child("ghost", "b");
        let lines = render_trace(&map, &index, 64);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event_id, "b");
        assert_eq!(lines[0].depth, 3);
    }

    #[test]
    fn test_empty_map_renders_nothing() {
        assert!(render_trace(&TraceMap::new(), &sample_index(), 64).is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let index = sample_index();
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "a");
        map.add_child("a", "b");
        map.add_child("b", "a");
        let lines = render_trace(&map, &index, 64);
        let ids: Vec<_> = lines.iter().map(|l| l.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_shared_child_rendered_once() {
        let index = sample_index();
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "a");
        map.add_child(ROOT_EVENT_ID, "c");
        map.add_child("a", "b");
        map.add_child("c", "b");
        let lines = render_trace(&map, &index, 64);
        let ids: Vec<_> = lines.iter().map(|l| (l.event_id.as_str(), l.depth)).collect();
        assert_eq!(ids, vec![("a", 2), ("b", 3), ("c", 2)]);
    }

    #[test]
    fn test_diamond_levels_visit_each_node_once() {
        // Each level splits into two nodes that rejoin; naive walks are 2^levels
        let levels = 24;
        let index = EventIndex::new();
        let mut map = TraceMap::new();
        let mut join = ROOT_EVENT_ID.to_string();
        for level in 0..levels {
            let left = format!("l{}", level);
            let right = format!("r{}", level);
            let next = format!("j{}", level);
            map.add_child(join.as_str(), left.as_str());
            map.add_child(join.as_str(), right.as_str());
            map.add_child(left.as_str(), next.as_str());
            map.add_child(right.as_str(), next.as_str());
            for id in [&left, &right, &next] {
                record_pair(
                    &index,
                    id,
                    "llm",
                    "2024-01-01 00:00:00.000000",
                    "2024-01-01 00:00:01.000000",
                );
            }
            join = next;
        }

        let lines = render_trace(&map, &index, 64);
        assert_eq!(lines.len(), levels * 3);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let len = 200_000;
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "n0");
        for i in 1..len {
            map.add_child(format!("n{}", i - 1), format!("n{}", i));
        }
        let index = EventIndex::new();
        record_pair(
            &index,
            &format!("n{}", len - 1),
            "llm",
            "2024-01-01 00:00:00.000000",
            "2024-01-01 00:00:02.000000",
        );

        let lines = render_trace(&map, &index, usize::MAX);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].depth, len + 1);
    }

    #[test]
    fn test_depth_bound_stops_descent() {
        let index = sample_index();
        let lines = render_trace(&sample_map(), &index, 2);
        let ids: Vec<_> = lines.iter().map(|l| l.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_bad_timestamp_skips_only_that_node() {
        let index = sample_index();
        index.insert(EventRecord::with_time(EventType::Query, None, "a2", "never"));
        let mut map = TraceMap::new();
        map.add_child(ROOT_EVENT_ID, "a2");
        map.add_child("a2", "c");
        let lines = render_trace(&map, &index, 64);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event_id, "c");
    }

    #[test]
    fn test_trace_state_lifecycle() {
        let mut state = TraceState::new();
        state.end(Some(sample_map()));
        assert!(!state.map().is_empty());

        state.start(Some("query"));
        assert!(state.map().is_empty());
        assert_eq!(state.trace_id(), Some("query"));

        state.end(None);
        assert!(state.map().is_empty());
    }

    #[test]
    fn test_write_trace_dump_brackets_lines() {
        let lines = render_trace(&sample_map(), &sample_index(), 64);
        let mut out = Vec::new();
        write_trace_dump(&mut out, Some("query"), &lines).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], "***************");
        assert_eq!(rows[1], "Trace: query");
        assert_eq!(rows[5], "***************");
    }

    #[test]
    fn test_trace_map_deserializes_from_plain_object() {
        let map: TraceMap =
            serde_json::from_str(r#"{"root": ["a"], "a": ["b", "c"]}"#).unwrap();
        assert_eq!(map.children("a"), ["b".to_string(), "c".to_string()]);
        assert!(map.children("b").is_empty());
    }
}
