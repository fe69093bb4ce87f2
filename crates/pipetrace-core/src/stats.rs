//! Timing statistics over event pairs

use crate::error::{TraceError, TraceResult};
use crate::pairing::EventPair;
use serde::{Deserialize, Serialize};

/// Rollup of pair durations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventStats {
    pub total_seconds: f64,
    pub average_seconds: f64,
    /// Number of pairs, including unmatched ones
    pub count: usize,
}

/// Compute total, average and count over a set of pairs.
///
/// Unmatched pairs contribute zero seconds but still count toward the
/// average. An empty input fails with [`TraceError::NoEvents`].
pub fn time_stats(pairs: &[EventPair]) -> TraceResult<EventStats> {
    if pairs.is_empty() {
        return Err(TraceError::NoEvents);
    }

    let mut total_seconds = 0.0;
    for pair in pairs {
        total_seconds += pair.duration_secs()?;
    }

    Ok(EventStats {
        total_seconds,
        average_seconds: total_seconds / pairs.len() as f64,
        count: pairs.len(),
    })
}
