//! Media asset and segment types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A media file with a known duration.
///
/// Inputs and the final output are both represented as assets; an asset is
/// never mutated in place. The duration is supplied by the caller (the
/// cut-point generator probes it); the engine itself never probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Path to the media file.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MediaAsset {
    /// Create a new asset.
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }

    /// Check whether the backing file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// A request to cut `[start, end)` out of a source asset.
///
/// Invariant `0 <= start < end <= source.duration` is re-checked by the
/// orchestrator before extraction; requests are never trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    /// Start time in seconds (inclusive).
    pub start_secs: f64,
    /// End time in seconds (exclusive).
    pub end_secs: f64,
}

impl SegmentRequest {
    /// Create a new segment request.
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Requested span in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Basic shape check: finite times, non-negative start, positive span.
    pub fn is_well_formed(&self) -> bool {
        self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.end_secs > self.start_secs
    }
}

/// An extracted segment on disk, owned by the run that produced it.
///
/// Dropping the value removes the file, so segments cannot leak across an
/// error exit. The concatenator borrows the path; the orchestrator drops
/// the guards once the output asset exists (or on any failure).
#[derive(Debug)]
pub struct SegmentFile {
    path: PathBuf,
}

impl SegmentFile {
    /// Take ownership of an extracted segment file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SegmentFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("failed to remove segment file {}: {}", self.path.display(), e);
            }
        }
    }
}
