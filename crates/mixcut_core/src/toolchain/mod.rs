//! External toolchain boundary.
//!
//! Everything the engine asks of the encode/decode toolchain goes through
//! the narrow [`ToolchainClient`] trait; commands are built as argument
//! vectors and executed with hard timeouts.

mod client;
mod command;

pub use client::{ExtractPlan, FfmpegClient, ToolchainClient};
pub use command::{ToolCommand, ToolError, ToolOutput, ToolResult};

use std::time::Duration;

/// Timeout for the encoder capability listing.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single segment extraction (either path).
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for hardware concatenation.
pub const CONCAT_HW_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for software concatenation.
pub const CONCAT_SW_TIMEOUT: Duration = Duration::from_secs(300);
