//! Pairing - grouping events that share an id into start/end pairs

use crate::error::{TraceError, TraceResult};
use crate::record::EventRecord;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;

/// Events sharing one id, in insertion order
///
/// Usually a start followed by an end. A pair may hold a single event
/// (unmatched) or more than two (the id was reused).
#[derive(Debug, Clone, PartialEq)]
pub struct EventPair {
    events: Vec<Arc<EventRecord>>,
}

impl EventPair {
    /// Build a pair from a non-empty sequence of events
    pub fn new(events: Vec<Arc<EventRecord>>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(Self { events })
        }
    }

    pub fn id(&self) -> &str {
        self.first().id()
    }

    pub fn first(&self) -> &EventRecord {
        &self.events[0]
    }

    pub fn last(&self) -> &EventRecord {
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[Arc<EventRecord>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether both a start and an end were seen
    pub fn is_complete(&self) -> bool {
        self.events.len() >= 2
    }

    /// Seconds between the first and last event, never negative
    pub fn duration_secs(&self) -> TraceResult<f64> {
        let start = self.first().timestamp()?;
        let end = self.last().timestamp()?;
        Ok(seconds_between(start, end).max(0.0))
    }
}

fn seconds_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Group events by id and order the groups by their first event's time.
///
/// Groups are first collected in order of first appearance; the sort is
/// stable, so groups with equal start times keep that order. A malformed
/// timestamp on any group's first event fails the whole call.
pub fn pair_events(events: &[Arc<EventRecord>]) -> TraceResult<Vec<EventPair>> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<Arc<EventRecord>>> = Vec::new();

    for event in events {
        let slot = *slots.entry(event.id()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(event.clone());
    }

    let mut keyed = groups
        .into_iter()
        .filter_map(EventPair::new)
        .map(|pair| Ok((pair.first().timestamp()?, pair)))
        .collect::<Result<Vec<_>, TraceError>>()?;

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, pair)| pair).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventType;

    fn at(id: &str, time: &str) -> Arc<EventRecord> {
        Arc::new(EventRecord::with_time(EventType::Llm, None, id, time))
    }

    fn ids(pairs: &[EventPair]) -> Vec<&str> {
        pairs.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_groups_by_id_in_insertion_order() {
        let events = vec![
            at("a", "2024-01-01 00:00:00.000000"),
            at("b", "2024-01-01 00:00:01.000000"),
            at("a", "2024-01-01 00:00:02.000000"),
            at("b", "2024-01-01 00:00:03.000000"),
            at("a", "2024-01-01 00:00:04.000000"),
        ];
        let pairs = pair_events(&events).unwrap();
        assert_eq!(ids(&pairs), vec!["a", "b"]);
        assert_eq!(pairs[0].len(), 3);
        assert_eq!(pairs[0].last().time(), "2024-01-01 00:00:04.000000");
        assert!(pairs[1].is_complete());
    }

    #[test]
    fn test_orders_groups_by_first_timestamp() {
        let events = vec![
            at("t2", "2024-01-01 00:00:02.000000"),
            at("t1", "2024-01-01 00:00:01.000000"),
            at("t3", "2024-01-01 00:00:03.000000"),
        ];
        let pairs = pair_events(&events).unwrap();
        assert_eq!(ids(&pairs), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_equal_start_times_keep_encounter_order() {
        let events = vec![
            at("x", "2024-01-01 00:00:01.000000"),
            at("y", "2024-01-01 00:00:01.000000"),
            at("w", "2024-01-01 00:00:00.500000"),
        ];
        let pairs = pair_events(&events).unwrap();
        assert_eq!(ids(&pairs), vec!["w", "x", "y"]);
    }

    #[test]
    fn test_pairing_is_idempotent() {
        let events = vec![
            at("b", "2024-01-01 00:00:02.000000"),
            at("a", "2024-01-01 00:00:01.000000"),
            at("b", "2024-01-01 00:00:03.000000"),
        ];
        let first = pair_events(&events).unwrap();
        let second = pair_events(&events).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_event_pair_has_zero_duration() {
        let pairs = pair_events(&[at("lonely", "2024-01-01 00:00:05.000000")]).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(!pairs[0].is_complete());
        assert_eq!(pairs[0].duration_secs().unwrap(), 0.0);
    }

    #[test]
    fn test_malformed_timestamp_fails_pairing() {
        let events = vec![at("ok", "2024-01-01 00:00:00.000000"), at("bad", "noon")];
        assert!(matches!(
            pair_events(&events),
            Err(TraceError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_empty_input_yields_no_pairs() {
        assert!(pair_events(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_order_end_clamps_to_zero() {
        let pair = EventPair::new(vec![
            at("r", "2024-01-01 00:00:02.000000"),
            at("r", "2024-01-01 00:00:01.000000"),
        ])
        .unwrap();
        assert_eq!(pair.duration_secs().unwrap(), 0.0);
    }
}
