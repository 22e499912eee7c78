//! Engine error taxonomy.
//!
//! Only run-fatal conditions are represented here. Probe and alignment
//! degradation are logged and recovered locally, never surfaced as errors;
//! hardware-path failures are recovered by the software fallback inside
//! the same call, so callers only ever see a software-path failure.

use thiserror::Error;

/// Fatal errors surfaced by an orchestrator run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A segment could not be extracted, even via the software path.
    #[error("extraction failed for [{start:.3}s, {end:.3}s): {cause}")]
    ExtractionFailed { start: f64, end: f64, cause: String },

    /// The ordered segment files could not be joined, even via the
    /// software path.
    #[error("concatenation failed: {cause}")]
    ConcatenationFailed { cause: String },

    /// The run was cancelled at a step boundary.
    #[error("run cancelled during {phase}")]
    Cancelled { phase: String },

    /// The orchestrator has already run; `reset()` starts a fresh run.
    #[error("orchestrator already ran (phase: {phase}); call reset() first")]
    AlreadyRan { phase: String },

    /// Filesystem error while managing run-owned artifacts.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Create an extraction failure for the given time range.
    pub fn extraction_failed(start: f64, end: f64, cause: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            start,
            end,
            cause: cause.into(),
        }
    }

    /// Create a concatenation failure.
    pub fn concatenation_failed(cause: impl Into<String>) -> Self {
        Self::ConcatenationFailed {
            cause: cause.into(),
        }
    }

    /// Create a cancellation error naming the phase that was interrupted.
    pub fn cancelled(phase: impl Into<String>) -> Self {
        Self::Cancelled {
            phase: phase.into(),
        }
    }

    /// Create an I/O error with operation context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_displays_range_and_cause() {
        let err = EngineError::extraction_failed(1.5, 4.0, "ffmpeg exited with code 1");
        let msg = err.to_string();
        assert!(msg.contains("1.500"));
        assert!(msg.contains("4.000"));
        assert!(msg.contains("exited with code 1"));
    }

    #[test]
    fn cancelled_names_phase() {
        let err = EngineError::cancelled("Concatenating");
        assert!(err.to_string().contains("Concatenating"));
    }
}
