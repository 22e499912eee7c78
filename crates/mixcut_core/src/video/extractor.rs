//! Segment extraction.

use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};
use crate::hardware::HardwareCapability;
use crate::models::{MediaAsset, SegmentFile, SegmentRequest};
use crate::toolchain::{ExtractPlan, ToolchainClient};

use super::backend::{extract_backend_for, VideoBackend};

/// Cuts `[start, end)` segments out of a source asset.
pub struct SegmentExtractor<'a> {
    client: &'a dyn ToolchainClient,
    backend: Box<dyn VideoBackend>,
}

impl<'a> SegmentExtractor<'a> {
    /// Create an extractor, selecting the execution path from capability.
    pub fn new(client: &'a dyn ToolchainClient, capability: HardwareCapability) -> Self {
        Self {
            client,
            backend: extract_backend_for(capability),
        }
    }

    /// Name of the selected execution path.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Extract one segment into `dest`.
    ///
    /// The request is re-checked here even though the orchestrator
    /// validates earlier; extraction is also usable standalone. On
    /// success the returned guard owns a file that exists and is
    /// non-empty; on failure any partial file has been removed.
    pub fn extract(
        &self,
        asset: &MediaAsset,
        request: &SegmentRequest,
        dest: PathBuf,
    ) -> EngineResult<SegmentFile> {
        if !request.is_well_formed() {
            return Err(EngineError::extraction_failed(
                request.start_secs,
                request.end_secs,
                "invalid time range",
            ));
        }

        let plan = ExtractPlan {
            source: &asset.path,
            dest: &dest,
            start_secs: request.start_secs,
            duration_secs: request.duration_secs(),
        };

        tracing::debug!(
            "extracting [{:.3}s, {:.3}s) from {} via {} path",
            request.start_secs,
            request.end_secs,
            asset.path.display(),
            self.backend.name()
        );

        match self.backend.run_extract(self.client, &plan) {
            Ok(()) => Ok(SegmentFile::new(dest)),
            Err(e) => {
                // The guard never existed, so clean up directly.
                if dest.exists() {
                    let _ = std::fs::remove_file(&dest);
                }
                Err(EngineError::extraction_failed(
                    request.start_secs,
                    request.end_secs,
                    e.to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{ToolError, ToolResult};
    use std::fs;
    use std::path::Path;

    struct SwWriter;

    impl ToolchainClient for SwWriter {
        fn probe_encoders(&self) -> ToolResult<String> {
            Ok(String::new())
        }
        fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!("software-only capability")
        }
        fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()> {
            fs::write(plan.dest, b"segment").unwrap();
            Ok(())
        }
        fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!()
        }
        fn concat_sw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!()
        }
    }

    struct AlwaysFails;

    impl ToolchainClient for AlwaysFails {
        fn probe_encoders(&self) -> ToolResult<String> {
            Ok(String::new())
        }
        fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
            Err(ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 1,
                stderr: "hw".to_string(),
            })
        }
        fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()> {
            // Simulate a crash that leaves a partial file behind.
            fs::write(plan.dest, b"partial").unwrap();
            Err(ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 1,
                stderr: "sw".to_string(),
            })
        }
        fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!()
        }
        fn concat_sw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!()
        }
    }

    fn asset(dir: &Path) -> MediaAsset {
        let path = dir.join("in.mp4");
        fs::write(&path, b"source").unwrap();
        MediaAsset::new(path, 30.0)
    }

    #[test]
    fn extract_produces_owned_segment() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset(dir.path());
        let extractor = SegmentExtractor::new(&SwWriter, HardwareCapability::software_only());

        let dest = dir.path().join("segment_0000.mp4");
        let segment = extractor
            .extract(&asset, &SegmentRequest::new(0.0, 2.0), dest.clone())
            .unwrap();

        assert_eq!(segment.path(), dest);
        assert!(dest.exists());
        drop(segment);
        assert!(!dest.exists());
    }

    #[test]
    fn invalid_range_is_rejected_before_any_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset(dir.path());
        let extractor = SegmentExtractor::new(&SwWriter, HardwareCapability::software_only());

        let result = extractor.extract(
            &asset,
            &SegmentRequest::new(5.0, 5.0),
            dir.path().join("bad.mp4"),
        );
        assert!(matches!(
            result,
            Err(EngineError::ExtractionFailed { .. })
        ));
    }

    #[test]
    fn total_failure_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset(dir.path());
        let extractor = SegmentExtractor::new(&AlwaysFails, HardwareCapability::software_only());

        let dest = dir.path().join("segment_0000.mp4");
        let result = extractor.extract(&asset, &SegmentRequest::new(0.0, 2.0), dest.clone());

        assert!(matches!(result, Err(EngineError::ExtractionFailed { .. })));
        assert!(!dest.exists());
    }
}
