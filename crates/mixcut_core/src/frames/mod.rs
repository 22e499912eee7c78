//! Pure per-frame adjustments: filter and resize.
//!
//! Frames are `Array3<f32>` in channel-major `(C, H, W)` layout with
//! values in `[0, 1]`. Both engines apply identical per-frame arithmetic;
//! the batched engine fans the batch out with rayon, the serial engine is
//! a plain loop. No I/O, no randomness; results depend only on the
//! inputs. This is a cosmetic path: callers map the error case to "use
//! the input unchanged" and carry on.

use ndarray::Array3;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::FrameSettings;
use crate::hardware::HardwareCapability;

/// One decoded frame, `(channels, height, width)`, values in `[0, 1]`.
pub type Frame = Array3<f32>;

/// Errors from frame processing. Never fatal to a pipeline run.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame batch")]
    EmptyBatch,

    #[error("frame {index} has a zero dimension")]
    EmptyFrame { index: usize },

    #[error("invalid resize target {height}x{width}")]
    InvalidTarget { height: usize, width: usize },
}

/// A frame-processing engine variant.
pub trait FrameEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Apply the brightness/contrast filter to every frame.
    fn transform(&self, frames: &[Frame], settings: &FrameSettings)
        -> Result<Vec<Frame>, FrameError>;

    /// Resize every frame to `(height, width)` with bilinear sampling.
    fn resize(
        &self,
        frames: &[Frame],
        height: usize,
        width: usize,
    ) -> Result<Vec<Frame>, FrameError>;
}

/// Batched engine: frames are assumed resident in engine-owned buffers
/// and are processed in parallel.
pub struct BatchedFrameEngine;

/// Serial engine: sequential loop over host-memory frames.
pub struct SerialFrameEngine;

impl FrameEngine for BatchedFrameEngine {
    fn name(&self) -> &str {
        "batched"
    }

    fn transform(
        &self,
        frames: &[Frame],
        settings: &FrameSettings,
    ) -> Result<Vec<Frame>, FrameError> {
        validate_batch(frames)?;
        Ok(frames
            .par_iter()
            .map(|frame| apply_filter(frame, settings))
            .collect())
    }

    fn resize(
        &self,
        frames: &[Frame],
        height: usize,
        width: usize,
    ) -> Result<Vec<Frame>, FrameError> {
        validate_batch(frames)?;
        validate_target(height, width)?;
        Ok(frames
            .par_iter()
            .map(|frame| resize_frame(frame, height, width))
            .collect())
    }
}

impl FrameEngine for SerialFrameEngine {
    fn name(&self) -> &str {
        "serial"
    }

    fn transform(
        &self,
        frames: &[Frame],
        settings: &FrameSettings,
    ) -> Result<Vec<Frame>, FrameError> {
        validate_batch(frames)?;
        Ok(frames
            .iter()
            .map(|frame| apply_filter(frame, settings))
            .collect())
    }

    fn resize(
        &self,
        frames: &[Frame],
        height: usize,
        width: usize,
    ) -> Result<Vec<Frame>, FrameError> {
        validate_batch(frames)?;
        validate_target(height, width)?;
        Ok(frames
            .iter()
            .map(|frame| resize_frame(frame, height, width))
            .collect())
    }
}

/// Select the frame engine for the probed capability.
pub fn engine_for(capability: HardwareCapability) -> Box<dyn FrameEngine> {
    if capability.extract_hw {
        Box::new(BatchedFrameEngine)
    } else {
        Box::new(SerialFrameEngine)
    }
}

fn validate_batch(frames: &[Frame]) -> Result<(), FrameError> {
    if frames.is_empty() {
        return Err(FrameError::EmptyBatch);
    }
    for (index, frame) in frames.iter().enumerate() {
        let (c, h, w) = frame.dim();
        if c == 0 || h == 0 || w == 0 {
            return Err(FrameError::EmptyFrame { index });
        }
    }
    Ok(())
}

fn validate_target(height: usize, width: usize) -> Result<(), FrameError> {
    if height == 0 || width == 0 {
        return Err(FrameError::InvalidTarget { height, width });
    }
    Ok(())
}

/// Brightness scale, then contrast about the per-channel spatial mean,
/// both clamped back into `[0, 1]`.
fn apply_filter(frame: &Frame, settings: &FrameSettings) -> Frame {
    let mut out = frame.mapv(|v| (v * settings.brightness).clamp(0.0, 1.0));
    for mut channel in out.outer_iter_mut() {
        let mean = channel.mean().unwrap_or(0.0);
        channel.mapv_inplace(|v| ((v - mean) * settings.contrast + mean).clamp(0.0, 1.0));
    }
    out
}

/// Bilinear resize with half-pixel centers.
fn resize_frame(frame: &Frame, height: usize, width: usize) -> Frame {
    let (channels, src_h, src_w) = frame.dim();
    let scale_y = src_h as f32 / height as f32;
    let scale_x = src_w as f32 / width as f32;

    let mut out = Array3::<f32>::zeros((channels, height, width));
    for ch in 0..channels {
        for y in 0..height {
            let sy = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
            let y0 = (sy.floor() as usize).min(src_h - 1);
            let y1 = (y0 + 1).min(src_h - 1);
            let fy = sy - y0 as f32;

            for x in 0..width {
                let sx = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);
                let x0 = (sx.floor() as usize).min(src_w - 1);
                let x1 = (x0 + 1).min(src_w - 1);
                let fx = sx - x0 as f32;

                let top = frame[[ch, y0, x0]] * (1.0 - fx) + frame[[ch, y0, x1]] * fx;
                let bottom = frame[[ch, y1, x0]] * (1.0 - fx) + frame[[ch, y1, x1]] * fx;
                out[[ch, y, x]] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(h: usize, w: usize) -> Frame {
        Array3::from_shape_fn((3, h, w), |(c, y, x)| {
            ((c + 1) * (y * w + x)) as f32 / (3 * h * w) as f32
        })
    }

    #[test]
    fn filter_keeps_values_in_unit_range() {
        let frames = vec![gradient_frame(8, 8)];
        let out = SerialFrameEngine
            .transform(&frames, &FrameSettings::default())
            .unwrap();
        assert!(out[0].iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn engines_agree_on_transform() {
        let frames = vec![gradient_frame(16, 12), gradient_frame(7, 9)];
        let settings = FrameSettings::default();

        let serial = SerialFrameEngine.transform(&frames, &settings).unwrap();
        let batched = BatchedFrameEngine.transform(&frames, &settings).unwrap();

        for (a, b) in serial.iter().zip(&batched) {
            assert_eq!(a.dim(), b.dim());
            for (va, vb) in a.iter().zip(b.iter()) {
                assert!((va - vb).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn engines_agree_on_resize() {
        let frames = vec![gradient_frame(16, 16)];
        let serial = SerialFrameEngine.resize(&frames, 8, 10).unwrap();
        let batched = BatchedFrameEngine.resize(&frames, 8, 10).unwrap();

        assert_eq!(serial[0].dim(), (3, 8, 10));
        for (va, vb) in serial[0].iter().zip(batched[0].iter()) {
            assert!((va - vb).abs() < 1e-6);
        }
    }

    #[test]
    fn resize_of_constant_frame_is_constant() {
        let frames = vec![Array3::from_elem((1, 10, 10), 0.25_f32)];
        let out = SerialFrameEngine.resize(&frames, 4, 4).unwrap();
        assert!(out[0].iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn transform_is_deterministic() {
        let frames = vec![gradient_frame(12, 12)];
        let settings = FrameSettings::default();
        let first = BatchedFrameEngine.transform(&frames, &settings).unwrap();
        let second = BatchedFrameEngine.transform(&frames, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_batch_is_an_error_not_a_panic() {
        let result = SerialFrameEngine.transform(&[], &FrameSettings::default());
        assert_eq!(result.unwrap_err(), FrameError::EmptyBatch);
    }

    #[test]
    fn zero_dimension_frame_is_rejected() {
        let frames = vec![Array3::<f32>::zeros((3, 0, 4))];
        let result = SerialFrameEngine.resize(&frames, 2, 2);
        assert_eq!(result.unwrap_err(), FrameError::EmptyFrame { index: 0 });
    }

    #[test]
    fn engine_selection_follows_capability() {
        let hw = HardwareCapability {
            extract_hw: true,
            concat_hw: true,
        };
        assert_eq!(engine_for(hw).name(), "batched");
        assert_eq!(
            engine_for(HardwareCapability::software_only()).name(),
            "serial"
        );
    }
}
