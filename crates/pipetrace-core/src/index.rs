//! Event index - by-type, by-id and sequential views over recorded events
//!
//! All three views live behind a single lock, so an insert or flush is
//! atomic with respect to readers. Reads hand out snapshots; callers can
//! never mutate the index through them.

use crate::record::{EventRecord, EventType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct IndexViews {
    by_type: HashMap<EventType, Vec<Arc<EventRecord>>>,
    by_id: HashMap<String, Vec<Arc<EventRecord>>>,
    sequential: Vec<Arc<EventRecord>>,
}

/// Record counts per view, taken under one lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewSizes {
    pub by_type: usize,
    pub by_id: usize,
    pub sequential: usize,
}

/// Indexes every recorded event three ways
#[derive(Debug, Default)]
pub struct EventIndex {
    views: RwLock<IndexViews>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to all three views
    pub fn insert(&self, record: EventRecord) -> Arc<EventRecord> {
        let record = Arc::new(record);
        let mut views = self.views.write();
        views
            .by_type
            .entry(record.event_type().clone())
            .or_default()
            .push(record.clone());
        views
            .by_id
            .entry(record.id().to_string())
            .or_default()
            .push(record.clone());
        views.sequential.push(record.clone());
        record
    }

    /// Events of one type, or the full sequential log
    pub fn events(&self, event_type: Option<&EventType>) -> Vec<Arc<EventRecord>> {
        let views = self.views.read();
        match event_type {
            Some(t) => views.by_type.get(t).cloned().unwrap_or_default(),
            None => views.sequential.clone(),
        }
    }

    /// All events sharing one id, in insertion order
    pub fn by_id(&self, id: &str) -> Vec<Arc<EventRecord>> {
        self.views.read().by_id.get(id).cloned().unwrap_or_default()
    }

    pub fn by_type_snapshot(&self) -> HashMap<EventType, Vec<Arc<EventRecord>>> {
        self.views.read().by_type.clone()
    }

    pub fn by_id_snapshot(&self) -> HashMap<String, Vec<Arc<EventRecord>>> {
        self.views.read().by_id.clone()
    }

    pub fn len(&self) -> usize {
        self.views.read().sequential.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view_sizes(&self) -> ViewSizes {
        let views = self.views.read();
        ViewSizes {
            by_type: views.by_type.values().map(Vec::len).sum(),
            by_id: views.by_id.values().map(Vec::len).sum(),
            sequential: views.sequential.len(),
        }
    }

    /// Drop every record from all three views
    pub fn flush(&self) {
        *self.views.write() = IndexViews::default();
    }
}
