//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a serde default so a partial config file is valid.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Encoder parameters for the toolchain command lines.
    #[serde(default)]
    pub encode: EncodeSettings,

    /// Timeline alignment parameters.
    #[serde(default)]
    pub alignment: AlignmentSettings,

    /// Frame filter parameters.
    #[serde(default)]
    pub frames: FrameSettings,

    /// Performance knobs.
    #[serde(default)]
    pub performance: PerformanceSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Path configuration for output and temp artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder under which each run creates its own temp directory.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Output folder for final assets.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_output_folder() -> String {
    "clip_output".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            output_folder: default_output_folder(),
        }
    }
}

/// Encoder parameters passed to the external toolchain.
///
/// Defaults mirror the stock ffmpeg invocations: libx264 for the software
/// path, NVENC for the hardware path, audio stream-copied throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Software video encoder.
    #[serde(default = "default_sw_codec")]
    pub video_codec: String,

    /// Hardware video encoder.
    #[serde(default = "default_hw_encoder")]
    pub hw_encoder: String,

    /// Encoder preset for extraction and hardware concat.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Encoder preset for software concat (slower, final pass).
    #[serde(default = "default_concat_preset")]
    pub concat_preset: String,

    /// Constant rate factor for software encodes.
    #[serde(default = "default_crf")]
    pub crf: u32,
}

fn default_sw_codec() -> String {
    "libx264".to_string()
}

fn default_hw_encoder() -> String {
    "h264_nvenc".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_concat_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u32 {
    23
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: default_sw_codec(),
            hw_encoder: default_hw_encoder(),
            preset: default_preset(),
            concat_preset: default_concat_preset(),
            crf: default_crf(),
        }
    }
}

/// Timeline alignment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentSettings {
    /// Minimum gap between adjacent intervals after overlap resolution,
    /// in seconds.
    #[serde(default = "default_min_gap")]
    pub min_gap_secs: f64,

    /// Upper bound on overlap-resolution passes.
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
}

fn default_min_gap() -> f64 {
    0.1
}

fn default_max_passes() -> u32 {
    16
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            min_gap_secs: default_min_gap(),
            max_passes: default_max_passes(),
        }
    }
}

/// Frame filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSettings {
    /// Brightness multiplier.
    #[serde(default = "default_brightness")]
    pub brightness: f32,

    /// Contrast multiplier about the per-channel mean.
    #[serde(default = "default_contrast")]
    pub contrast: f32,
}

fn default_brightness() -> f32 {
    1.1
}

fn default_contrast() -> f32 {
    1.2
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            contrast: default_contrast(),
        }
    }
}

/// Performance knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSettings {
    /// Maximum concurrent extraction workers. 1 disables parallelism;
    /// concatenation is always single-threaded.
    #[serde(default = "default_extract_workers")]
    pub extract_workers: usize,
}

fn default_extract_workers() -> usize {
    1
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            extract_workers: default_extract_workers(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,
}
