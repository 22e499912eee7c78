//! Hardware capability detection.
//!
//! The toolchain's encoder listing is probed once per process and the
//! result memoized; every failure mode (spawn, timeout, nonzero exit,
//! unrecognizable output) degrades to the safe software-only default and
//! is logged, never raised.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::toolchain::ToolchainClient;

/// Encoder identifiers that mark the extraction hardware path as usable.
const EXTRACT_HW_ENCODERS: &[&str] = &["h264_nvenc", "hevc_nvenc"];

/// Encoder identifier that marks the concat hardware path as usable.
const CONCAT_HW_ENCODER: &str = "h264_nvenc";

/// Which hardware-accelerated paths the toolchain offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareCapability {
    /// Hardware-accelerated segment extraction is available.
    pub extract_hw: bool,
    /// Hardware-accelerated concatenation is available.
    pub concat_hw: bool,
}

impl HardwareCapability {
    /// The safe default: software paths only.
    pub fn software_only() -> Self {
        Self {
            extract_hw: false,
            concat_hw: false,
        }
    }

    /// Derive capability flags from an encoder listing.
    fn from_encoder_listing(listing: &str) -> Self {
        let listing = listing.to_lowercase();
        Self {
            extract_hw: EXTRACT_HW_ENCODERS.iter().any(|enc| listing.contains(enc)),
            concat_hw: listing.contains(CONCAT_HW_ENCODER),
        }
    }
}

/// Probe the toolchain for hardware capability.
///
/// Never fails: any probe error yields the software-only default and a
/// warning. Prefer [`cached_capability`] outside tests; probing spawns a
/// subprocess.
pub fn probe(client: &dyn ToolchainClient) -> HardwareCapability {
    match client.probe_encoders() {
        Ok(listing) => {
            let capability = HardwareCapability::from_encoder_listing(&listing);
            tracing::info!(
                "toolchain capability: extract_hw={} concat_hw={}",
                capability.extract_hw,
                capability.concat_hw
            );
            capability
        }
        Err(e) => {
            tracing::warn!("encoder probe degraded, assuming software only: {}", e);
            HardwareCapability::software_only()
        }
    }
}

/// Process-wide memoized capability.
static CAPABILITY: Lazy<Mutex<Option<HardwareCapability>>> = Lazy::new(|| Mutex::new(None));

/// Get the memoized capability, probing on first use.
///
/// The probe runs under the cache lock, so concurrent callers never spawn
/// redundant probe subprocesses or observe a half-written value.
pub fn cached_capability(client: &dyn ToolchainClient) -> HardwareCapability {
    let mut slot = CAPABILITY.lock();
    if let Some(capability) = *slot {
        return capability;
    }
    let capability = probe(client);
    *slot = Some(capability);
    capability
}

/// Drop the memoized capability so the next call re-probes.
///
/// Intended for tests and for hosts that know the toolchain changed
/// underneath them.
pub fn reset_capability_cache() {
    *CAPABILITY.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{ExtractPlan, ToolError, ToolResult};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProbe {
        listing: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn ok(listing: &'static str) -> Self {
            Self {
                listing: Some(listing),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                listing: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ToolchainClient for ScriptedProbe {
        fn probe_encoders(&self) -> ToolResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.listing {
                Some(s) => Ok(s.to_string()),
                None => Err(ToolError::Timeout {
                    tool: "ffmpeg".to_string(),
                    secs: 10,
                }),
            }
        }

        fn extract_hw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!("probe-only client")
        }
        fn extract_sw(&self, _: &ExtractPlan) -> ToolResult<()> {
            unreachable!("probe-only client")
        }
        fn concat_hw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!("probe-only client")
        }
        fn concat_sw(&self, _: &Path, _: &Path) -> ToolResult<()> {
            unreachable!("probe-only client")
        }
    }

    #[test]
    fn listing_with_nvenc_enables_both_paths() {
        let cap = HardwareCapability::from_encoder_listing(
            "V..... libx264\n V..... h264_nvenc NVIDIA NVENC H.264 encoder",
        );
        assert!(cap.extract_hw);
        assert!(cap.concat_hw);
    }

    #[test]
    fn hevc_only_listing_enables_extraction_only() {
        let cap = HardwareCapability::from_encoder_listing("V..... HEVC_NVENC");
        assert!(cap.extract_hw);
        assert!(!cap.concat_hw);
    }

    #[test]
    fn software_listing_disables_hardware() {
        let cap = HardwareCapability::from_encoder_listing("V..... libx264\nA..... aac");
        assert_eq!(cap, HardwareCapability::software_only());
    }

    #[test]
    fn probe_failure_degrades_to_software_only() {
        let client = ScriptedProbe::failing();
        assert_eq!(probe(&client), HardwareCapability::software_only());
    }

    #[test]
    fn cache_probes_once_and_resets() {
        reset_capability_cache();

        let client = ScriptedProbe::ok("h264_nvenc");
        let first = cached_capability(&client);
        let second = cached_capability(&client);
        assert_eq!(first, second);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        reset_capability_cache();
        let _ = cached_capability(&client);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);

        // Leave a clean slate for other tests sharing the process cache.
        reset_capability_cache();
    }
}
