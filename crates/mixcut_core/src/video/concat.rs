//! Segment concatenation via the toolchain's concat demuxer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::hardware::HardwareCapability;
use crate::models::{MediaAsset, SegmentFile};
use crate::toolchain::ToolchainClient;

use super::backend::{concat_backend_for, VideoBackend};

/// The concat demuxer's input list, written next to the output.
///
/// One `file '<path>'` line per segment, in output order, paths
/// forward-slash normalized. The file is removed when the guard drops,
/// which covers every exit path of the concatenation.
#[derive(Debug)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    /// Write a manifest listing `segments` in order, placed at
    /// `<dest>.list`.
    pub fn write(dest: &Path, segments: &[SegmentFile]) -> EngineResult<Self> {
        let mut name = dest.as_os_str().to_os_string();
        name.push(".list");
        let path = PathBuf::from(name);

        let mut content = String::new();
        for segment in segments {
            let normalized = segment.path().to_string_lossy().replace('\\', "/");
            content.push_str(&format!("file '{}'\n", normalized));
        }

        let mut file = fs::File::create(&path)
            .map_err(|e| EngineError::io("creating concat manifest", e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| EngineError::io("writing concat manifest", e))?;

        Ok(Self { path })
    }

    /// Path of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ManifestFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(
                    "failed to remove concat manifest {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Joins ordered segment files into one output asset.
pub struct SegmentConcatenator<'a> {
    client: &'a dyn ToolchainClient,
    backend: Box<dyn VideoBackend>,
}

impl<'a> SegmentConcatenator<'a> {
    /// Create a concatenator, selecting the execution path from capability.
    pub fn new(client: &'a dyn ToolchainClient, capability: HardwareCapability) -> Self {
        Self {
            client,
            backend: concat_backend_for(capability),
        }
    }

    /// Name of the selected execution path.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Concatenate `segments` in order into `dest`.
    ///
    /// `total_duration_secs` becomes the output asset's duration metadata
    /// (the sum of the requested segment spans; the engine does not
    /// probe). On failure no partial output is left behind.
    pub fn concatenate(
        &self,
        segments: &[SegmentFile],
        dest: &Path,
        total_duration_secs: f64,
    ) -> EngineResult<MediaAsset> {
        if segments.is_empty() {
            return Err(EngineError::concatenation_failed(
                "no segment files to concatenate",
            ));
        }
        for segment in segments {
            if !segment.path().exists() {
                return Err(EngineError::concatenation_failed(format!(
                    "segment file missing: {}",
                    segment.path().display()
                )));
            }
        }

        let manifest = ManifestFile::write(dest, segments)?;

        tracing::info!(
            "concatenating {} segments into {} via {} path",
            segments.len(),
            dest.display(),
            self.backend.name()
        );

        match self.backend.run_concat(self.client, manifest.path(), dest) {
            Ok(()) => Ok(MediaAsset::new(dest, total_duration_secs)),
            Err(e) => {
                if dest.exists() {
                    let _ = fs::remove_file(dest);
                }
                Err(EngineError::concatenation_failed(e.to_string()))
            }
        }
        // `manifest` drops here, removing the scratch file on every path.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{ExtractPlan, ToolError, ToolResult};
    use std::sync::Mutex;

    fn make_segments(dir: &Path, count: usize) -> Vec<SegmentFile> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("segment_{:04}.mp4", i));
                fs::write(&path, b"segment data").unwrap();
                SegmentFile::new(path)
            })
            .collect()
    }

    /// Records the manifest content observed at concat time.
    struct ManifestInspector {
        seen: Mutex<Option<String>>,
    }

    impl ManifestInspector {
        fn new() -> Self {
            Self {
                seen: Mutex::new(None),
            }
        }
    }

    impl ToolchainClient for ManifestInspector {
        fn probe_encoders(&self) -> ToolResult<String> {
            Ok(String::new())
        }
        fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!()
        }
        fn extract_sw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!()
        }
        fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!("software-only capability")
        }
        fn concat_sw(&self, manifest: &Path, dest: &Path) -> ToolResult<()> {
            *self.seen.lock().unwrap() = Some(fs::read_to_string(manifest).unwrap());
            fs::write(dest, b"joined").unwrap();
            Ok(())
        }
    }

    struct FailingConcat;

    impl ToolchainClient for FailingConcat {
        fn probe_encoders(&self) -> ToolResult<String> {
            Ok(String::new())
        }
        fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!()
        }
        fn extract_sw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!()
        }
        fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!()
        }
        fn concat_sw(&self, _: &Path, dest: &Path) -> ToolResult<()> {
            fs::write(dest, b"partial").unwrap();
            Err(ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 1,
                stderr: "scripted".to_string(),
            })
        }
    }

    #[test]
    fn manifest_lists_segments_in_order_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let segments = make_segments(dir.path(), 3);
        let dest = dir.path().join("out.mp4");

        let client = ManifestInspector::new();
        let concatenator =
            SegmentConcatenator::new(&client, HardwareCapability::software_only());
        let asset = concatenator.concatenate(&segments, &dest, 6.0).unwrap();

        assert!((asset.duration_secs - 6.0).abs() < 1e-9);

        let manifest_content = client.seen.lock().unwrap().take().unwrap();
        let lines: Vec<&str> = manifest_content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file '"));
        assert!(lines[0].contains("segment_0000.mp4"));
        assert!(lines[2].contains("segment_0002.mp4"));
        assert!(!manifest_content.contains('\\'));

        // Manifest scratch file is gone after the call.
        let mut list_name = dest.as_os_str().to_os_string();
        list_name.push(".list");
        assert!(!PathBuf::from(list_name).exists());
    }

    #[test]
    fn empty_segment_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = ManifestInspector::new();
        let concatenator =
            SegmentConcatenator::new(&client, HardwareCapability::software_only());

        let result = concatenator.concatenate(&[], &dir.path().join("out.mp4"), 0.0);
        assert!(matches!(
            result,
            Err(EngineError::ConcatenationFailed { .. })
        ));
    }

    #[test]
    fn failure_removes_manifest_and_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let segments = make_segments(dir.path(), 2);
        let dest = dir.path().join("out.mp4");

        let concatenator =
            SegmentConcatenator::new(&FailingConcat, HardwareCapability::software_only());
        let result = concatenator.concatenate(&segments, &dest, 4.0);

        assert!(matches!(
            result,
            Err(EngineError::ConcatenationFailed { .. })
        ));
        assert!(!dest.exists());

        let mut list_name = dest.as_os_str().to_os_string();
        list_name.push(".list");
        assert!(!PathBuf::from(list_name).exists());
    }

    #[test]
    fn missing_segment_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let segments = make_segments(dir.path(), 1);
        fs::remove_file(segments[0].path()).unwrap();

        let client = ManifestInspector::new();
        let concatenator =
            SegmentConcatenator::new(&client, HardwareCapability::software_only());
        let result = concatenator.concatenate(&segments, &dir.path().join("out.mp4"), 2.0);
        assert!(matches!(
            result,
            Err(EngineError::ConcatenationFailed { .. })
        ));
    }
}
