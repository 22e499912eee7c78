//! Caption timeline alignment.
//!
//! Repairs an interval sequence so adjacent intervals do not overlap and
//! every time lies within the asset. Overlaps are resolved symmetrically:
//! each overlapping pair gives up half the overlap on each side plus half
//! the minimum gap, preserving as much of both intervals as possible.
//!
//! The resolution pass only touches `end[i]` and `start[i+1]` for each
//! pair, fields no other pair in the same pass writes, so one pass is
//! order-independent. That makes the batched (whole-sequence `ndarray`
//! arithmetic) and sequential implementations perform the same f64
//! operations and agree exactly, which is a correctness contract here,
//! not a performance detail. Passes are iterated to a fixed point with a
//! bounded cap to handle intervals that overlap both neighbors.
//!
//! `align` never fails: non-finite input degrades to clamp-only and any
//! batched-path error falls back to the sequential loop, both logged.

use ndarray::{s, Array1};
use thiserror::Error;

use crate::config::AlignmentSettings;
use crate::models::{AlignedTimeline, Interval};

/// Internal error for the batched path; recovered by falling back to the
/// sequential path, never surfaced.
#[derive(Error, Debug)]
enum BatchError {
    #[error("start/end sequences diverged in length")]
    LengthMismatch,
}

/// Repairs caption interval sequences.
#[derive(Debug, Clone)]
pub struct TimelineAligner {
    min_gap_secs: f64,
    max_passes: u32,
}

impl Default for TimelineAligner {
    fn default() -> Self {
        Self::new(&AlignmentSettings::default())
    }
}

impl TimelineAligner {
    /// Create an aligner from settings.
    pub fn new(settings: &AlignmentSettings) -> Self {
        Self {
            min_gap_secs: settings.min_gap_secs,
            max_passes: settings.max_passes.max(1),
        }
    }

    /// Align `intervals` against an asset of `asset_duration` seconds.
    ///
    /// Intervals are processed in caller order; payloads are preserved.
    pub fn align(&self, intervals: &[Interval], asset_duration: f64) -> AlignedTimeline {
        if intervals.is_empty() {
            return AlignedTimeline::default();
        }

        let mut starts: Vec<f64> = intervals.iter().map(|iv| iv.start_secs).collect();
        let mut ends: Vec<f64> = intervals.iter().map(|iv| iv.end_secs).collect();

        let well_formed = asset_duration.is_finite()
            && asset_duration >= 0.0
            && starts.iter().chain(ends.iter()).all(|t| t.is_finite());

        if !well_formed {
            tracing::warn!(
                "alignment degraded: non-finite or negative input, clamping only"
            );
            clamp_into(&mut starts, &mut ends, asset_duration);
            return rebuild(intervals, &starts, &ends);
        }

        match self.align_batched(&starts, &ends, asset_duration) {
            Ok((s, e)) => {
                starts = s;
                ends = e;
            }
            Err(err) => {
                tracing::debug!("batched alignment unavailable ({}), using sequential", err);
                self.align_sequential(&mut starts, &mut ends, asset_duration);
            }
        }

        rebuild(intervals, &starts, &ends)
    }

    /// Sequential reference implementation.
    fn align_sequential(&self, starts: &mut [f64], ends: &mut [f64], asset_duration: f64) {
        let half_gap = self.min_gap_secs / 2.0;
        let mut converged = false;

        for _ in 0..self.max_passes {
            let mut changed = false;
            for i in 0..starts.len().saturating_sub(1) {
                let overlap = ends[i] - starts[i + 1];
                if overlap > 0.0 {
                    let adjustment = overlap / 2.0 + half_gap;
                    ends[i] -= adjustment;
                    starts[i + 1] += adjustment;
                    changed = true;
                }
            }
            if !changed {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                "alignment degraded: overlap resolution hit the {}-pass cap",
                self.max_passes
            );
        }

        clamp_into(starts, ends, asset_duration);
    }

    /// Batched implementation: the same passes as whole-sequence
    /// arithmetic.
    fn align_batched(
        &self,
        starts: &[f64],
        ends: &[f64],
        asset_duration: f64,
    ) -> Result<(Vec<f64>, Vec<f64>), BatchError> {
        if starts.len() != ends.len() {
            return Err(BatchError::LengthMismatch);
        }

        let n = starts.len();
        let half_gap = self.min_gap_secs / 2.0;
        let mut starts = Array1::from_iter(starts.iter().copied());
        let mut ends = Array1::from_iter(ends.iter().copied());

        if n > 1 {
            let mut converged = false;
            for _ in 0..self.max_passes {
                let overlap = &ends.slice(s![..n - 1]) - &starts.slice(s![1..]);
                let adjustment =
                    overlap.mapv(|o| if o > 0.0 { o / 2.0 + half_gap } else { 0.0 });

                if adjustment.iter().all(|&a| a == 0.0) {
                    converged = true;
                    break;
                }

                ends.slice_mut(s![..n - 1])
                    .zip_mut_with(&adjustment, |e, &a| *e -= a);
                starts
                    .slice_mut(s![1..])
                    .zip_mut_with(&adjustment, |st, &a| *st += a);
            }

            if !converged {
                tracing::warn!(
                    "alignment degraded: overlap resolution hit the {}-pass cap",
                    self.max_passes
                );
            }
        }

        starts.mapv_inplace(|v| v.clamp(0.0, asset_duration));
        ends.mapv_inplace(|v| v.clamp(0.0, asset_duration));

        Ok((starts.to_vec(), ends.to_vec()))
    }

    /// Sequential-only entry point, exposed for the equivalence contract.
    #[doc(hidden)]
    pub fn align_serial_only(&self, intervals: &[Interval], asset_duration: f64) -> AlignedTimeline {
        if intervals.is_empty() {
            return AlignedTimeline::default();
        }
        let mut starts: Vec<f64> = intervals.iter().map(|iv| iv.start_secs).collect();
        let mut ends: Vec<f64> = intervals.iter().map(|iv| iv.end_secs).collect();
        self.align_sequential(&mut starts, &mut ends, asset_duration);
        rebuild(intervals, &starts, &ends)
    }
}

fn clamp_into(starts: &mut [f64], ends: &mut [f64], asset_duration: f64) {
    let upper = if asset_duration.is_finite() {
        asset_duration.max(0.0)
    } else {
        f64::MAX
    };
    for t in starts.iter_mut().chain(ends.iter_mut()) {
        if t.is_nan() {
            *t = 0.0;
        } else {
            *t = t.clamp(0.0, upper);
        }
    }
}

fn rebuild(intervals: &[Interval], starts: &[f64], ends: &[f64]) -> AlignedTimeline {
    let rebuilt = intervals
        .iter()
        .zip(starts.iter().zip(ends.iter()))
        .map(|(iv, (&start, &end))| Interval::new(start, end, iv.payload.clone()))
        .collect();
    AlignedTimeline::from_intervals(rebuilt)
}
