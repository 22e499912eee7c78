//! Data model shared across the engine.

mod media;
mod timeline;

pub use media::{MediaAsset, SegmentFile, SegmentRequest};
pub use timeline::{AlignedTimeline, Interval};
