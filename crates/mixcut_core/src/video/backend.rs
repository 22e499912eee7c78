//! Execution-path selection for extraction and concatenation.
//!
//! One polymorphic backend interface with two variants: the hardware
//! backend attempts the accelerated path and falls back to software
//! within the same call; the software backend goes straight to software.
//! Callers select a variant from [`HardwareCapability`] once and then
//! depend only on the trait.

use std::fs;
use std::path::Path;

use crate::hardware::HardwareCapability;
use crate::toolchain::{ExtractPlan, ToolError, ToolResult, ToolchainClient};

/// A selected execution path for toolchain operations.
pub trait VideoBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Run one extraction, verifying the declared output.
    fn run_extract(&self, client: &dyn ToolchainClient, plan: &ExtractPlan) -> ToolResult<()>;

    /// Run one concatenation, verifying the declared output.
    fn run_concat(
        &self,
        client: &dyn ToolchainClient,
        manifest: &Path,
        dest: &Path,
    ) -> ToolResult<()>;
}

/// Hardware path with in-call software fallback.
pub struct HardwareBackend;

/// Software path only.
pub struct SoftwareBackend;

impl VideoBackend for HardwareBackend {
    fn name(&self) -> &str {
        "hardware"
    }

    fn run_extract(&self, client: &dyn ToolchainClient, plan: &ExtractPlan) -> ToolResult<()> {
        match client
            .extract_hw(plan)
            .and_then(|()| verify_output(plan.dest))
        {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    "hardware extraction failed ({}), falling back to software",
                    e
                );
                remove_partial(plan.dest);
                client.extract_sw(plan)?;
                verify_output(plan.dest)
            }
        }
    }

    fn run_concat(
        &self,
        client: &dyn ToolchainClient,
        manifest: &Path,
        dest: &Path,
    ) -> ToolResult<()> {
        match client
            .concat_hw(manifest, dest)
            .and_then(|()| verify_output(dest))
        {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    "hardware concatenation failed ({}), falling back to software",
                    e
                );
                remove_partial(dest);
                client.concat_sw(manifest, dest)?;
                verify_output(dest)
            }
        }
    }
}

impl VideoBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn run_extract(&self, client: &dyn ToolchainClient, plan: &ExtractPlan) -> ToolResult<()> {
        client.extract_sw(plan)?;
        verify_output(plan.dest)
    }

    fn run_concat(
        &self,
        client: &dyn ToolchainClient,
        manifest: &Path,
        dest: &Path,
    ) -> ToolResult<()> {
        client.concat_sw(manifest, dest)?;
        verify_output(dest)
    }
}

/// Select the extraction backend for the probed capability.
pub fn extract_backend_for(capability: HardwareCapability) -> Box<dyn VideoBackend> {
    if capability.extract_hw {
        Box::new(HardwareBackend)
    } else {
        Box::new(SoftwareBackend)
    }
}

/// Select the concatenation backend for the probed capability.
pub fn concat_backend_for(capability: HardwareCapability) -> Box<dyn VideoBackend> {
    if capability.concat_hw {
        Box::new(HardwareBackend)
    } else {
        Box::new(SoftwareBackend)
    }
}

/// A tool exit code of zero is not enough: the declared output must exist
/// and be non-empty before a path counts as successful.
fn verify_output(path: &Path) -> ToolResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(ToolError::OutputMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// Remove a partial output left behind by a failed attempt.
fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("failed to remove partial output {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted client: hardware calls fail after writing a partial file,
    /// software calls write real output.
    struct FallbackClient {
        hw_calls: AtomicUsize,
        sw_calls: AtomicUsize,
        hw_writes_partial: bool,
    }

    impl FallbackClient {
        fn new(hw_writes_partial: bool) -> Self {
            Self {
                hw_calls: AtomicUsize::new(0),
                sw_calls: AtomicUsize::new(0),
                hw_writes_partial,
            }
        }

        fn fail(&self) -> ToolError {
            ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 1,
                stderr: "scripted hardware failure".to_string(),
            }
        }
    }

    impl ToolchainClient for FallbackClient {
        fn probe_encoders(&self) -> ToolResult<String> {
            Ok("h264_nvenc".to_string())
        }

        fn extract_hw(&self, plan: &ExtractPlan) -> ToolResult<()> {
            self.hw_calls.fetch_add(1, Ordering::SeqCst);
            if self.hw_writes_partial {
                fs::write(plan.dest, b"partial").unwrap();
            }
            Err(self.fail())
        }

        fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()> {
            self.sw_calls.fetch_add(1, Ordering::SeqCst);
            fs::write(plan.dest, b"segment data").unwrap();
            Ok(())
        }

        fn concat_hw(&self, _manifest: &Path, dest: &Path) -> ToolResult<()> {
            self.hw_calls.fetch_add(1, Ordering::SeqCst);
            if self.hw_writes_partial {
                fs::write(dest, b"partial").unwrap();
            }
            Err(self.fail())
        }

        fn concat_sw(&self, _manifest: &Path, dest: &Path) -> ToolResult<()> {
            self.sw_calls.fetch_add(1, Ordering::SeqCst);
            fs::write(dest, b"joined data").unwrap();
            Ok(())
        }
    }

    #[test]
    fn hardware_backend_falls_back_and_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let dest = dir.path().join("seg.mp4");
        fs::write(&source, b"source").unwrap();

        let client = FallbackClient::new(true);
        let plan = ExtractPlan {
            source: &source,
            dest: &dest,
            start_secs: 0.0,
            duration_secs: 1.0,
        };

        HardwareBackend.run_extract(&client, &plan).unwrap();

        assert_eq!(client.hw_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.sw_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read(&dest).unwrap(), b"segment data");
    }

    #[test]
    fn software_backend_never_touches_hardware() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let dest = dir.path().join("seg.mp4");
        fs::write(&source, b"source").unwrap();

        let client = FallbackClient::new(false);
        let plan = ExtractPlan {
            source: &source,
            dest: &dest,
            start_secs: 0.0,
            duration_secs: 1.0,
        };

        SoftwareBackend.run_extract(&client, &plan).unwrap();
        assert_eq!(client.hw_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.sw_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_output_counts_as_failure() {
        struct EmptyWriter;
        impl ToolchainClient for EmptyWriter {
            fn probe_encoders(&self) -> ToolResult<String> {
                Ok(String::new())
            }
            fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
                unreachable!()
            }
            fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()> {
                fs::write(plan.dest, b"").unwrap();
                Ok(())
            }
            fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
                unreachable!()
            }
            fn concat_sw(&self, _: &Path, _: &Path) -> ToolResult<()> {
                unreachable!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let dest = dir.path().join("seg.mp4");
        fs::write(&source, b"source").unwrap();

        let plan = ExtractPlan {
            source: &source,
            dest: &dest,
            start_secs: 0.0,
            duration_secs: 1.0,
        };
        let result = SoftwareBackend.run_extract(&EmptyWriter, &plan);
        assert!(matches!(result, Err(ToolError::OutputMissing { .. })));
    }

    #[test]
    fn backend_selection_follows_capability() {
        let hw = HardwareCapability {
            extract_hw: true,
            concat_hw: false,
        };
        assert_eq!(extract_backend_for(hw).name(), "hardware");
        assert_eq!(concat_backend_for(hw).name(), "software");

        let none = HardwareCapability::software_only();
        assert_eq!(extract_backend_for(none).name(), "software");
    }
}
