//! Caption interval and aligned timeline types.

use serde::{Deserialize, Serialize};

/// A caption/subtitle time interval with its payload text.
///
/// Sequences are kept in original caller order (the order of the caption
/// stream), not sorted by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Start time in seconds.
    pub start_secs: f64,
    /// End time in seconds.
    pub end_secs: f64,
    /// Caption payload.
    pub payload: String,
}

impl Interval {
    /// Create a new interval.
    pub fn new(start_secs: f64, end_secs: f64, payload: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            payload: payload.into(),
        }
    }

    /// Interval span in seconds (may be non-positive for degenerate
    /// intervals left behind by clamping).
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// An interval sequence repaired by the aligner.
///
/// Invariants after alignment: adjacent intervals do not overlap
/// (`end[i] <= start[i+1]`), and every time lies within
/// `[0, asset_duration]`. Pairs that required overlap resolution are
/// additionally separated by the configured minimum gap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignedTimeline {
    intervals: Vec<Interval>,
}

impl AlignedTimeline {
    /// Wrap an already-aligned interval sequence.
    pub(crate) fn from_intervals(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }

    /// The aligned intervals, in caller order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Consume the timeline, returning the intervals.
    pub fn into_intervals(self) -> Vec<Interval> {
        self.intervals
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Check the ordering and bounds invariants against an asset duration.
    pub fn invariants_hold(&self, asset_duration: f64) -> bool {
        let in_bounds = self
            .intervals
            .iter()
            .all(|iv| iv.start_secs >= 0.0 && iv.end_secs <= asset_duration);

        let ordered = self
            .intervals
            .windows(2)
            .all(|pair| pair[0].end_secs <= pair[1].start_secs);

        in_bounds && ordered
    }
}
