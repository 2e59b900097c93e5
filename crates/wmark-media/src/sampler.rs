//! Frame sampling.
//!
//! Grabs up to three stills per asset (0.5s, 50% and 90% of duration). An
//! offset the container rejects is skipped; if every offset fails, a single
//! unconditioned first-frame grab is attempted. An empty result means the
//! asset is undetectable and goes straight to the orientation fallback.
//!
//! Frames are written into a caller-owned scratch directory. The caller is
//! responsible for removing it once scoring is done.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use wmark_models::{FrameTag, VideoAsset};

/// Offset of the `start` sample, in seconds.
pub const START_OFFSET_SECS: f64 = 0.5;
/// Fraction of duration for the `middle` sample.
pub const MIDDLE_FRACTION: f64 = 0.5;
/// Fraction of duration for the `end` sample.
pub const END_FRACTION: f64 = 0.9;

/// Default timeout for a single frame grab.
const FRAME_TIMEOUT_SECS: u64 = 30;

/// A decoded still plus where it came from.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub tag: FrameTag,
    /// Seek offset in seconds; `None` for the unconditioned first frame
    pub offset: Option<f64>,
    pub image: RgbImage,
    /// Scratch file the still was decoded from
    pub path: PathBuf,
}

impl FrameSample {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Writes one still from `input` to `dest` (PNG).
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, input: &Path, offset: Option<f64>, dest: &Path) -> MediaResult<()>;
}

/// `FrameExtractor` backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    timeout_secs: u64,
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self {
            timeout_secs: FRAME_TIMEOUT_SECS,
        }
    }
}

impl FfmpegFrameExtractor {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract(&self, input: &Path, offset: Option<f64>, dest: &Path) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(input, dest).without_progress();
        if let Some(seconds) = offset {
            cmd = cmd.seek(seconds);
        }
        let cmd = cmd.map_first_video().single_frame();

        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run(&cmd)
            .await?;

        // ffmpeg exits 0 without writing anything when the seek lands past the end
        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(MediaError::frame_extraction(format!(
                "no frame written at offset {:?}",
                offset
            ))),
        }
    }
}

/// Planned `(tag, seconds)` offsets for a clip of `duration` seconds.
///
/// Unknown duration (0) only plans the start offset.
pub fn sample_offsets(duration: f64) -> Vec<(FrameTag, f64)> {
    if !(duration.is_finite() && duration > 0.0) {
        return vec![(FrameTag::Start, START_OFFSET_SECS)];
    }

    // Very short clips: keep the start sample inside the clip
    let start = START_OFFSET_SECS.min(duration * 0.25);
    vec![
        (FrameTag::Start, start),
        (FrameTag::Middle, duration * MIDDLE_FRACTION),
        (FrameTag::End, duration * END_FRACTION),
    ]
}

/// Samples frames from an asset through a `FrameExtractor`.
#[derive(Clone)]
pub struct FrameSampler {
    extractor: Arc<dyn FrameExtractor>,
}

impl FrameSampler {
    pub fn new(extractor: Arc<dyn FrameExtractor>) -> Self {
        Self { extractor }
    }

    /// Sampler using the ffmpeg CLI.
    pub fn ffmpeg() -> Self {
        Self::new(Arc::new(FfmpegFrameExtractor::default()))
    }

    /// Sample 1-3 frames into `scratch`. Never fails; returns an empty list
    /// when every attempt failed.
    pub async fn sample(&self, asset: &VideoAsset, scratch: &Path) -> Vec<FrameSample> {
        let mut frames = Vec::new();

        for (tag, seconds) in sample_offsets(asset.duration) {
            match self.grab(asset, tag, Some(seconds), scratch).await {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(
                    asset = %asset.name(),
                    frame = %tag,
                    offset = seconds,
                    "Frame extraction failed, skipping offset: {}", e
                ),
            }
        }

        if frames.is_empty() {
            debug!(asset = %asset.name(), "All offsets failed, trying first frame");
            match self.grab(asset, FrameTag::First, None, scratch).await {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(
                    asset = %asset.name(),
                    "First-frame extraction failed, asset is undetectable: {}", e
                ),
            }
        }

        frames
    }

    async fn grab(
        &self,
        asset: &VideoAsset,
        tag: FrameTag,
        offset: Option<f64>,
        scratch: &Path,
    ) -> MediaResult<FrameSample> {
        let dest = scratch.join(format!("frame_{}.png", tag));

        let result = match self.extractor.extract(&asset.path, offset, &dest).await {
            Ok(()) => decode_frame(dest.clone()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(image) => Ok(FrameSample {
                tag,
                offset,
                image,
                path: dest,
            }),
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest).await;
                Err(e)
            }
        }
    }
}

async fn decode_frame(path: PathBuf) -> MediaResult<RgbImage> {
    let image = tokio::task::spawn_blocking(move || image::open(&path).map(|img| img.to_rgb8()))
        .await
        .map_err(|e| MediaError::frame_extraction(format!("decode task failed: {}", e)))??;

    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::frame_extraction("decoded an empty frame"));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a flat grey PNG, failing for configured offsets.
    struct FakeExtractor {
        fail_offsets: bool,
        fail_first: bool,
        calls: Mutex<Vec<Option<f64>>>,
    }

    impl FakeExtractor {
        fn new(fail_offsets: bool, fail_first: bool) -> Self {
            Self {
                fail_offsets,
                fail_first,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract(
            &self,
            _input: &Path,
            offset: Option<f64>,
            dest: &Path,
        ) -> MediaResult<()> {
            self.calls.lock().unwrap().push(offset);
            let fail = match offset {
                Some(_) => self.fail_offsets,
                None => self.fail_first,
            };
            if fail {
                return Err(MediaError::ffmpeg_failed("decoder rejected seek", None, Some(1)));
            }
            RgbImage::from_pixel(64, 36, image::Rgb([128, 128, 128])).save(dest)?;
            Ok(())
        }
    }

    fn asset() -> VideoAsset {
        VideoAsset::new("/videos/a.mp4", 64, 36, 10.0)
    }

    #[test]
    fn test_sample_offsets() {
        let offsets = sample_offsets(10.0);
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets[0], (FrameTag::Start, 0.5));
        assert_eq!(offsets[1], (FrameTag::Middle, 5.0));
        assert_eq!(offsets[2], (FrameTag::End, 9.0));
    }

    #[test]
    fn test_sample_offsets_short_and_unknown() {
        assert_eq!(sample_offsets(0.0), vec![(FrameTag::Start, 0.5)]);
        assert_eq!(sample_offsets(f64::NAN).len(), 1);
        let short = sample_offsets(1.0);
        assert!(short.iter().all(|(_, s)| *s < 1.0));
    }

    #[tokio::test]
    async fn test_sample_all_offsets() {
        let scratch = TempDir::new().unwrap();
        let sampler = FrameSampler::new(Arc::new(FakeExtractor::new(false, false)));

        let frames = sampler.sample(&asset(), scratch.path()).await;
        let tags: Vec<_> = frames.iter().map(|f| f.tag).collect();
        assert_eq!(tags, vec![FrameTag::Start, FrameTag::Middle, FrameTag::End]);
        assert!(frames.iter().all(|f| f.path.starts_with(scratch.path())));
        assert_eq!(frames[0].width(), 64);
    }

    #[tokio::test]
    async fn test_falls_back_to_first_frame() {
        let scratch = TempDir::new().unwrap();
        let extractor = Arc::new(FakeExtractor::new(true, false));
        let sampler = FrameSampler::new(extractor.clone());

        let frames = sampler.sample(&asset(), scratch.path()).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].tag, FrameTag::First);
        assert_eq!(frames[0].offset, None);
        assert_eq!(extractor.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_total_failure_returns_empty() {
        let scratch = TempDir::new().unwrap();
        let sampler = FrameSampler::new(Arc::new(FakeExtractor::new(true, true)));

        let frames = sampler.sample(&asset(), scratch.path()).await;
        assert!(frames.is_empty());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        struct GarbageExtractor;

        #[async_trait]
        impl FrameExtractor for GarbageExtractor {
            async fn extract(&self, _: &Path, _: Option<f64>, dest: &Path) -> MediaResult<()> {
                tokio::fs::write(dest, b"not a png").await?;
                Ok(())
            }
        }

        let scratch = TempDir::new().unwrap();
        let frames = FrameSampler::new(Arc::new(GarbageExtractor))
            .sample(&asset(), scratch.path())
            .await;
        assert!(frames.is_empty());
    }
}
