//! Orchestrator run types.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{AlignedTimeline, MediaAsset};

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run started yet (or `reset()` was called).
    Idle,
    /// Extracting segment `completed` of `total`.
    Extracting { completed: usize, total: usize },
    /// Joining extracted segments.
    Concatenating,
    /// Terminal: the output asset exists.
    Done,
    /// Terminal: the run failed; the error carries the first fatal cause.
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "Idle"),
            RunPhase::Extracting { completed, total } => {
                write!(f, "Extracting({} of {})", completed, total)
            }
            RunPhase::Concatenating => write!(f, "Concatenating"),
            RunPhase::Done => write!(f, "Done"),
            RunPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Handle for cancelling a run.
///
/// Cancellation is cooperative: it takes effect at the next step
/// boundary; an in-flight toolchain call runs to its timeout.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// The concatenated output asset.
    pub asset: MediaAsset,
    /// The repaired caption timeline.
    pub timeline: AlignedTimeline,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Record of one run, kept in the orchestrator's in-memory history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier (also names the run's temp directory).
    pub run_id: String,
    /// When the run started (RFC 3339, local time).
    pub started_at: String,
    /// Number of requested segments.
    pub requested_segments: usize,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Output asset path, when the run completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Wall-clock duration of the run in seconds.
    pub wall_secs: f64,
}
