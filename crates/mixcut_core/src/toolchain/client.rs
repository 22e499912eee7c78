//! The five-operation toolchain client.
//!
//! The external encode/decode process is an FFI-like boundary: exactly
//! five operations, parameterized through argument vectors, never
//! assembled from unescaped strings. The engine inspects only exit codes,
//! declared-output existence, and (for the probe) stdout content.

use std::path::Path;

use crate::config::EncodeSettings;

use super::command::{ToolCommand, ToolResult};
use super::{CONCAT_HW_TIMEOUT, CONCAT_SW_TIMEOUT, EXTRACT_TIMEOUT, PROBE_TIMEOUT};

/// Parameters of a single segment extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPlan<'a> {
    /// Source media file.
    pub source: &'a Path,
    /// Destination segment file.
    pub dest: &'a Path,
    /// Start offset in seconds.
    pub start_secs: f64,
    /// Span to extract in seconds.
    pub duration_secs: f64,
}

/// Narrow interface to the external toolchain.
///
/// Production uses [`FfmpegClient`]; tests script this trait to exercise
/// fallback and failure paths without a real toolchain.
pub trait ToolchainClient: Send + Sync {
    /// List available encoders; returns raw stdout.
    fn probe_encoders(&self) -> ToolResult<String>;

    /// Extract a segment on the hardware path.
    fn extract_hw(&self, plan: &ExtractPlan) -> ToolResult<()>;

    /// Extract a segment on the software path.
    fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()>;

    /// Concatenate per a manifest file on the hardware path.
    fn concat_hw(&self, manifest: &Path, dest: &Path) -> ToolResult<()>;

    /// Concatenate per a manifest file on the software path.
    fn concat_sw(&self, manifest: &Path, dest: &Path) -> ToolResult<()>;
}

/// FFmpeg-backed toolchain client.
pub struct FfmpegClient {
    program: String,
    encode: EncodeSettings,
}

impl FfmpegClient {
    /// Create a client invoking `ffmpeg` from PATH.
    pub fn new(encode: EncodeSettings) -> Self {
        Self::with_program("ffmpeg", encode)
    }

    /// Create a client invoking a specific ffmpeg binary.
    pub fn with_program(program: impl Into<String>, encode: EncodeSettings) -> Self {
        Self {
            program: program.into(),
            encode,
        }
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.program)
    }
}

impl ToolchainClient for FfmpegClient {
    fn probe_encoders(&self) -> ToolResult<String> {
        let out = self
            .command()
            .args(["-hide_banner", "-encoders"])
            .timeout(PROBE_TIMEOUT)
            .run()?;
        Ok(out.stdout)
    }

    fn extract_hw(&self, plan: &ExtractPlan) -> ToolResult<()> {
        self.command()
            .args(["-y", "-hwaccel", "cuda", "-hwaccel_output_format", "cuda", "-i"])
            .arg(plan.source)
            .arg("-ss")
            .arg(format!("{:.3}", plan.start_secs))
            .arg("-t")
            .arg(format!("{:.3}", plan.duration_secs))
            .args(["-c:v", self.encode.hw_encoder.as_str()])
            .args(["-preset", self.encode.preset.as_str()])
            .args(["-c:a", "copy", "-avoid_negative_ts", "make_zero"])
            .arg(plan.dest)
            .timeout(EXTRACT_TIMEOUT)
            .run()?;
        Ok(())
    }

    fn extract_sw(&self, plan: &ExtractPlan) -> ToolResult<()> {
        self.command()
            .args(["-y", "-i"])
            .arg(plan.source)
            .arg("-ss")
            .arg(format!("{:.3}", plan.start_secs))
            .arg("-t")
            .arg(format!("{:.3}", plan.duration_secs))
            .args(["-c:v", self.encode.video_codec.as_str()])
            .args(["-preset", self.encode.preset.as_str()])
            .arg("-crf")
            .arg(self.encode.crf.to_string())
            .args(["-c:a", "copy", "-avoid_negative_ts", "make_zero"])
            .arg(plan.dest)
            .timeout(EXTRACT_TIMEOUT)
            .run()?;
        Ok(())
    }

    fn concat_hw(&self, manifest: &Path, dest: &Path) -> ToolResult<()> {
        self.command()
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c:v", self.encode.hw_encoder.as_str()])
            .args(["-preset", self.encode.preset.as_str()])
            .args(["-c:a", "copy"])
            .arg(dest)
            .timeout(CONCAT_HW_TIMEOUT)
            .run()?;
        Ok(())
    }

    fn concat_sw(&self, manifest: &Path, dest: &Path) -> ToolResult<()> {
        self.command()
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c:v", self.encode.video_codec.as_str()])
            .args(["-preset", self.encode.concat_preset.as_str()])
            .arg("-crf")
            .arg(self.encode.crf.to_string())
            .args(["-c:a", "copy"])
            .arg(dest)
            .timeout(CONCAT_SW_TIMEOUT)
            .run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolError;

    #[test]
    fn missing_binary_surfaces_spawn_error() {
        let client = FfmpegClient::with_program(
            "mixcut_no_such_ffmpeg",
            EncodeSettings::default(),
        );
        let result = client.probe_encoders();
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }
}
