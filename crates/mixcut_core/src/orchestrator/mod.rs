//! Run orchestration.
//!
//! One orchestrator instance corresponds to one run (or an explicit
//! `reset()` between runs). The orchestrator owns the run's temp
//! directory, sequences validation, extraction, concatenation, and
//! timeline alignment, and guarantees the directory is removed on every
//! exit path: success, failure, cancellation, or drop.
//!
//! # State machine
//!
//! ```text
//! Idle -> Extracting(k of n) -> Concatenating -> Done
//!                \________________/
//!                         v
//!                       Failed
//! ```

mod types;

pub use types::{CancelHandle, RunOutcome, RunOutput, RunPhase, RunReport};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::frames::{self, Frame};
use crate::hardware::{self, HardwareCapability};
use crate::models::{Interval, MediaAsset, SegmentFile, SegmentRequest};
use crate::timeline::TimelineAligner;
use crate::toolchain::ToolchainClient;
use crate::video::{SegmentConcatenator, SegmentExtractor};

/// Process-wide run counter so concurrent orchestrators never share a
/// temp directory even within the same clock second.
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sequences one segment-processing run.
pub struct Orchestrator {
    settings: Settings,
    client: Box<dyn ToolchainClient>,
    capability: HardwareCapability,
    aligner: TimelineAligner,
    phase: Mutex<RunPhase>,
    run_id: String,
    run_dir: PathBuf,
    cancelled: Arc<AtomicBool>,
    history: Vec<RunReport>,
}

impl Orchestrator {
    /// Create an orchestrator, probing (memoized) hardware capability.
    pub fn new(settings: Settings, client: Box<dyn ToolchainClient>) -> EngineResult<Self> {
        let capability = hardware::cached_capability(client.as_ref());
        Self::with_capability(settings, client, capability)
    }

    /// Create an orchestrator with an explicitly injected capability.
    pub fn with_capability(
        settings: Settings,
        client: Box<dyn ToolchainClient>,
        capability: HardwareCapability,
    ) -> EngineResult<Self> {
        let (run_id, run_dir) = create_run_dir(&settings.paths.temp_root)?;
        let aligner = TimelineAligner::new(&settings.alignment);

        Ok(Self {
            settings,
            client,
            capability,
            aligner,
            phase: Mutex::new(RunPhase::Idle),
            run_id,
            run_dir,
            cancelled: Arc::new(AtomicBool::new(false)),
            history: Vec::new(),
        })
    }

    /// The capability this orchestrator operates under.
    pub fn capability(&self) -> HardwareCapability {
        self.capability
    }

    /// Current run phase.
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// This run's identifier (names the temp directory).
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Reports of runs completed by this instance, oldest first.
    pub fn history(&self) -> &[RunReport] {
        &self.history
    }

    /// Get a handle for cooperative cancellation.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(Arc::clone(&self.cancelled))
    }

    /// Execute one run: extract every requested segment, concatenate them
    /// in request order into `output_path`, and align `captions` against
    /// the source asset's bounds.
    pub fn run(
        &mut self,
        asset: &MediaAsset,
        requests: &[SegmentRequest],
        captions: &[Interval],
        output_path: &Path,
    ) -> EngineResult<RunOutput> {
        {
            let phase = self.phase();
            if phase != RunPhase::Idle {
                return Err(EngineError::AlreadyRan {
                    phase: phase.to_string(),
                });
            }
        }

        let started = Instant::now();
        let started_at = chrono::Local::now().to_rfc3339();
        tracing::info!(
            "run {} starting: {} segments from {}",
            self.run_id,
            requests.len(),
            asset.path.display()
        );

        let result = self.run_inner(asset, requests, captions, output_path);

        let outcome = match &result {
            Ok(_) => {
                self.set_phase(RunPhase::Done);
                RunOutcome::Completed
            }
            Err(EngineError::Cancelled { .. }) => {
                self.set_phase(RunPhase::Failed);
                RunOutcome::Cancelled
            }
            Err(_) => {
                self.set_phase(RunPhase::Failed);
                RunOutcome::Failed
            }
        };

        self.cleanup_run_dir();
        self.history.push(RunReport {
            run_id: self.run_id.clone(),
            started_at,
            requested_segments: requests.len(),
            outcome,
            output_path: result.as_ref().ok().map(|out| out.asset.path.clone()),
            wall_secs: started.elapsed().as_secs_f64(),
        });

        match &result {
            Ok(out) => tracing::info!(
                "run {} done: {}",
                self.run_id,
                out.asset.path.display()
            ),
            Err(e) => tracing::error!("run {} failed: {}", self.run_id, e),
        }

        result
    }

    /// Prepare this instance for another run: fresh id, fresh temp
    /// directory, cleared cancellation.
    pub fn reset(&mut self) -> EngineResult<()> {
        self.cleanup_run_dir();
        let (run_id, run_dir) = create_run_dir(&self.settings.paths.temp_root)?;
        self.run_id = run_id;
        self.run_dir = run_dir;
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_phase(RunPhase::Idle);
        Ok(())
    }

    /// Apply the per-frame filter, passing frames through unchanged if
    /// the cosmetic path degrades.
    pub fn apply_frame_adjustments(&self, batch: Vec<Frame>) -> Vec<Frame> {
        let engine = frames::engine_for(self.capability);
        match engine.transform(&batch, &self.settings.frames) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("frame adjustment degraded, passing through unchanged: {}", e);
                batch
            }
        }
    }

    /// Resize frames, passing them through unchanged if the cosmetic path
    /// degrades.
    pub fn resize_frames(&self, batch: Vec<Frame>, height: usize, width: usize) -> Vec<Frame> {
        let engine = frames::engine_for(self.capability);
        match engine.resize(&batch, height, width) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("frame resize degraded, passing through unchanged: {}", e);
                batch
            }
        }
    }

    fn run_inner(
        &self,
        asset: &MediaAsset,
        requests: &[SegmentRequest],
        captions: &[Interval],
        output_path: &Path,
    ) -> EngineResult<RunOutput> {
        if !asset.exists() {
            return Err(EngineError::io(
                "opening source asset",
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    asset.path.display().to_string(),
                ),
            ));
        }

        let effective = validate_requests(asset, requests)?;
        let total = effective.len();

        self.check_cancelled("Extracting")?;
        self.set_phase(RunPhase::Extracting {
            completed: 0,
            total,
        });

        let extractor = SegmentExtractor::new(self.client.as_ref(), self.capability);
        let workers = self.settings.performance.extract_workers.max(1);
        let segments = if workers == 1 || total <= 1 {
            self.extract_sequential(&extractor, asset, &effective)?
        } else {
            self.extract_parallel(&extractor, asset, &effective, workers)?
        };

        self.check_cancelled("Concatenating")?;
        self.set_phase(RunPhase::Concatenating);

        let total_duration: f64 = effective.iter().map(SegmentRequest::duration_secs).sum();
        let concatenator = SegmentConcatenator::new(self.client.as_ref(), self.capability);
        let output = concatenator.concatenate(&segments, output_path, total_duration)?;

        // Segments are consumed; dropping the guards removes the temp files.
        drop(segments);

        let timeline = self.aligner.align(captions, asset.duration_secs);

        Ok(RunOutput {
            asset: output,
            timeline,
        })
    }

    fn extract_sequential(
        &self,
        extractor: &SegmentExtractor,
        asset: &MediaAsset,
        effective: &[SegmentRequest],
    ) -> EngineResult<Vec<SegmentFile>> {
        let total = effective.len();
        let mut segments = Vec::with_capacity(total);

        for (index, request) in effective.iter().enumerate() {
            self.check_cancelled("Extracting")?;
            let dest = self.segment_path(index);
            // On error, `segments` drops here and removes everything
            // extracted so far.
            segments.push(extractor.extract(asset, request, dest)?);
            self.set_phase(RunPhase::Extracting {
                completed: index + 1,
                total,
            });
        }

        Ok(segments)
    }

    /// Extract with up to `workers` threads pulling from a shared cursor.
    ///
    /// Results are committed in request order regardless of completion
    /// order; the first failure in request order is reported, and workers
    /// stop pulling new requests once any failure is observed.
    fn extract_parallel(
        &self,
        extractor: &SegmentExtractor,
        asset: &MediaAsset,
        effective: &[SegmentRequest],
        workers: usize,
    ) -> EngineResult<Vec<SegmentFile>> {
        let total = effective.len();
        let cursor = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let slots: Vec<Mutex<Option<EngineResult<SegmentFile>>>> =
            (0..total).map(|_| Mutex::new(None)).collect();

        thread::scope(|scope| {
            for _ in 0..workers.min(total) {
                scope.spawn(|| loop {
                    if failed.load(Ordering::SeqCst) || self.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }

                    let dest = self.segment_path(index);
                    let result = extractor.extract(asset, &effective[index], dest);
                    if result.is_ok() {
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        self.set_phase(RunPhase::Extracting {
                            completed: done,
                            total,
                        });
                    } else {
                        failed.store(true, Ordering::SeqCst);
                    }
                    *slots[index].lock() = Some(result);
                });
            }
        });

        // Commit in request order. Dropping `slots` on any early return
        // removes every segment that was extracted.
        let mut segments = Vec::with_capacity(total);
        for slot in slots {
            match slot.into_inner() {
                Some(Ok(segment)) => segments.push(segment),
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(self
                        .check_cancelled("Extracting")
                        .err()
                        .unwrap_or_else(|| {
                            EngineError::extraction_failed(
                                0.0,
                                0.0,
                                "extraction stopped before this segment",
                            )
                        }));
                }
            }
        }

        Ok(segments)
    }

    fn segment_path(&self, index: usize) -> PathBuf {
        self.run_dir.join(format!("segment_{:04}.mp4", index))
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock() = phase;
    }

    fn check_cancelled(&self, phase: &str) -> EngineResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            tracing::warn!("run {} cancelled during {}", self.run_id, phase);
            return Err(EngineError::cancelled(phase));
        }
        Ok(())
    }

    fn cleanup_run_dir(&self) {
        if self.run_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.run_dir) {
                tracing::warn!(
                    "failed to remove run directory {}: {}",
                    self.run_dir.display(),
                    e
                );
            } else {
                tracing::debug!("removed run directory {}", self.run_dir.display());
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cleanup_run_dir();
    }
}

/// Re-check every request against the asset.
///
/// Ends past the asset duration are clamped and logged; anything else
/// malformed fails the run. The engine never silently drops a requested
/// segment.
fn validate_requests(
    asset: &MediaAsset,
    requests: &[SegmentRequest],
) -> EngineResult<Vec<SegmentRequest>> {
    let duration = asset.duration_secs;
    let mut effective = Vec::with_capacity(requests.len());

    for request in requests {
        if !request.is_well_formed() {
            return Err(EngineError::extraction_failed(
                request.start_secs,
                request.end_secs,
                "invalid time range",
            ));
        }
        if request.start_secs >= duration {
            return Err(EngineError::extraction_failed(
                request.start_secs,
                request.end_secs,
                format!("start is at or past asset end ({:.3}s)", duration),
            ));
        }

        let mut end = request.end_secs;
        if end > duration {
            tracing::warn!(
                "segment end {:.3}s exceeds asset duration {:.3}s, clamping",
                end,
                duration
            );
            end = duration;
        }

        effective.push(SegmentRequest::new(request.start_secs, end));
    }

    Ok(effective)
}

fn create_run_dir(temp_root: &str) -> EngineResult<(String, PathBuf)> {
    let seq = RUN_SEQ.fetch_add(1, Ordering::SeqCst);
    let run_id = format!("{}_{:04}", chrono::Local::now().format("%Y%m%d%H%M%S"), seq);
    let run_dir = PathBuf::from(temp_root).join(format!("run_{}", run_id));

    fs::create_dir_all(&run_dir)
        .map_err(|e| EngineError::io(format!("creating run directory {}", run_dir.display()), e))?;

    Ok((run_id, run_dir))
}
