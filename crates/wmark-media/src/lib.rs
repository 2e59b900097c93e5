#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and watermark locator.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout
//! - FFprobe asset probing
//! - Frame sampling at fixed temporal offsets
//! - The region candidate catalogue, rule-table scorer and location selector
//! - Blot-and-brand filter graphs and the compositing engine

pub mod command;
pub mod compositor;
pub mod error;
pub mod filters;
pub mod locator;
pub mod probe;
pub mod progress;
pub mod regions;
pub mod sampler;
pub mod scorer;
pub mod selector;

pub use command::{check_environment, check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{ComposeReport, Compositor, EncodeBackend, FfmpegEncoder};
pub use error::{MediaError, MediaResult};
pub use filters::build_filter_graph;
pub use locator::{Detection, DetectorConfig, DetectorProfile, Locator};
pub use probe::{probe_video, AssetProber, FfprobeProber, VideoInfo};
pub use progress::FfmpegProgress;
pub use regions::{fallback_region, regions};
pub use sampler::{FfmpegFrameExtractor, FrameExtractor, FrameSample, FrameSampler};
pub use scorer::{BoostRule, ImageSignal, RegionScorer};
pub use selector::{select_location, DEFAULT_DETECTION_THRESHOLD};
