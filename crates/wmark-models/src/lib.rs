//! Shared data models for the watermark pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Probed video assets and their orientation
//! - Region candidates, scored regions and the selected location
//! - Compositing jobs and brand overlay styling
//! - Batch run bookkeeping and per-asset outcomes
//! - Encoding configuration

pub mod asset;
pub mod batch;
pub mod encoding;
pub mod job;
pub mod region;

// Re-export common types
pub use asset::{Orientation, VideoAsset};
pub use batch::{AssetOutcome, AssetState, BatchRun, RunId};
pub use encoding::{EncodingConfig, VideoCodec};
pub use job::{BrandStyle, CompositingJob};
pub use region::{Decision, FrameTag, Rect, RegionCandidate, ScoredRegion, SelectedLocation};
