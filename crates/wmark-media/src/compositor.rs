//! Compositing engine: blot the selected region and draw the brand mark.
//!
//! # Architecture
//!
//! - `EncodeBackend`: runs the filter graph and writes a file (ffmpeg in
//!   production, fakes in tests)
//! - `Compositor`: owns the job lifecycle around the backend: partial
//!   output, size sanity check, atomic rename, cleanup on failure
//!
//! Video is re-encoded (the graph rewrites pixels); audio is stream-copied.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::build_filter_graph;
use wmark_models::{BrandStyle, CompositingJob, EncodingConfig};

/// Outputs smaller than this share of the input are treated as truncated.
pub const DEFAULT_MIN_OUTPUT_RATIO: f64 = 0.3;

/// Runs a filter graph over `job.input_path`, writing `output`.
#[async_trait]
pub trait EncodeBackend: Send + Sync {
    async fn encode(
        &self,
        job: &CompositingJob,
        filter_graph: &str,
        output: &Path,
    ) -> MediaResult<()>;
}

/// `EncodeBackend` backed by the ffmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegEncoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    fn build_command(
        &self,
        job: &CompositingJob,
        filter_graph: &str,
        output: &Path,
    ) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(&job.input_path, output)
            .video_filter(filter_graph)
            .map_streams(job.has_audio)
            .args(self.encoding.to_video_args());

        let cmd = if job.has_audio {
            cmd.copy_audio()
        } else {
            cmd.no_audio()
        };

        cmd.faststart()
    }
}

#[async_trait]
impl EncodeBackend for FfmpegEncoder {
    async fn encode(
        &self,
        job: &CompositingJob,
        filter_graph: &str,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = self.build_command(job, filter_graph, output);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        let name = job
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        runner
            .run_with_progress(&cmd, move |p| {
                debug!(
                    asset = %name,
                    frame = p.frame,
                    speed = p.speed,
                    done = p.is_complete,
                    "Encode progress"
                );
            })
            .await
    }
}

/// Result of a successful compose.
#[derive(Debug, Clone)]
pub struct ComposeReport {
    pub output: PathBuf,
    pub input_size: u64,
    pub output_size: u64,
    pub filter_graph: String,
    pub elapsed: Duration,
}

/// Sibling path the backend writes to before the final rename.
pub fn partial_path(output: &Path) -> PathBuf {
    match output.extension() {
        Some(ext) => output.with_extension(format!("partial.{}", ext.to_string_lossy())),
        None => output.with_extension("partial"),
    }
}

/// Drives one `CompositingJob` through an `EncodeBackend`.
#[derive(Clone)]
pub struct Compositor {
    backend: Arc<dyn EncodeBackend>,
    style: BrandStyle,
    min_output_ratio: f64,
}

impl Compositor {
    pub fn new(backend: Arc<dyn EncodeBackend>, style: BrandStyle) -> Self {
        Self {
            backend,
            style,
            min_output_ratio: DEFAULT_MIN_OUTPUT_RATIO,
        }
    }

    /// Compositor using the ffmpeg CLI.
    pub fn ffmpeg(encoding: EncodingConfig, style: BrandStyle) -> Self {
        Self::new(Arc::new(FfmpegEncoder::new(encoding)), style)
    }

    pub fn with_min_output_ratio(mut self, ratio: f64) -> Self {
        self.min_output_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn style(&self) -> &BrandStyle {
        &self.style
    }

    /// Write `job.output_path`. On any failure no output file is left behind.
    pub async fn compose(&self, job: &CompositingJob) -> MediaResult<ComposeReport> {
        let started = Instant::now();

        let input_size = match tokio::fs::metadata(&job.input_path).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(MediaError::FileNotFound(job.input_path.clone())),
        };

        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let partial = partial_path(&job.output_path);
        // Leftover from a killed run
        let _ = tokio::fs::remove_file(&partial).await;

        let filter_graph = build_filter_graph(job, &self.style);
        info!(
            input = %job.input_path.display(),
            region = %job.location.region.label,
            rect = %job.location.region.rect,
            decision = %job.location.decision,
            "Compositing"
        );
        debug!(filter = %filter_graph, "Filter graph");

        let result = self
            .encode_and_verify(job, &filter_graph, &partial, input_size)
            .await;

        let output_size = match result {
            Ok(size) => size,
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, &job.output_path).await {
            discard(&partial).await;
            return Err(e.into());
        }

        Ok(ComposeReport {
            output: job.output_path.clone(),
            input_size,
            output_size,
            filter_graph,
            elapsed: started.elapsed(),
        })
    }

    async fn encode_and_verify(
        &self,
        job: &CompositingJob,
        filter_graph: &str,
        partial: &Path,
        input_size: u64,
    ) -> MediaResult<u64> {
        self.backend.encode(job, filter_graph, partial).await?;

        let output_size = tokio::fs::metadata(partial)
            .await
            .map(|m| m.len())
            .map_err(|_| {
                MediaError::ffmpeg_failed(
                    "Encoder reported success but wrote no output",
                    None,
                    None,
                )
            })?;

        let minimum = minimum_output_size(input_size, self.min_output_ratio);
        if output_size < minimum {
            warn!(
                output = %partial.display(),
                output_size,
                minimum,
                "Output implausibly small, discarding"
            );
            return Err(MediaError::OutputTooSmall {
                actual: output_size,
                minimum,
            });
        }

        Ok(output_size)
    }
}

/// Smallest acceptable output for an input of `input_size` bytes. Never
/// below one byte, so empty outputs always fail.
pub fn minimum_output_size(input_size: u64, ratio: f64) -> u64 {
    ((input_size as f64 * ratio).ceil() as u64).max(1)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove partial output: {}", e),
    }
}
