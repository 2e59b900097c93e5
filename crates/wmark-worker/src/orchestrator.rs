//! Batch orchestrator.
//!
//! Walks an input directory in sorted order and drives each video through
//! probe -> sample -> locate -> compose. Assets whose output already exists
//! are skipped, so an interrupted run can simply be restarted. A failure in
//! one asset is recorded and the batch moves on.
//!
//! At most one asset's scratch directory (sampled frames) exists at a time;
//! it is removed before the encode starts.

use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::config::BatchConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::AssetLogger;
use crate::report::BatchReport;
use wmark_media::{
    AssetProber, Compositor, DetectorProfile, FfmpegEncoder, FfprobeProber, FrameSampler, Locator,
    MediaError,
};
use wmark_models::{
    AssetOutcome, AssetState, BatchRun, CompositingJob, SelectedLocation, VideoAsset,
};

/// Recognised input extensions (case-insensitive).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Output path for `input`: `<out_dir>/<stem><suffix>.<ext>`.
pub fn output_path_for(input: &Path, out_dir: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    out_dir.join(name)
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

/// Whether `path` looks like something this tool wrote (a finished output
/// of any variant or a partial encode).
fn is_derived_file(path: &Path) -> bool {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return false;
    };
    stem.ends_with(".partial")
        || DetectorProfile::ALL
            .iter()
            .any(|p| stem.ends_with(p.output_suffix()))
}

/// Video files directly inside `dir`, sorted by file name.
///
/// When outputs are written next to the inputs, `exclude_derived` keeps the
/// tool's own outputs from being picked up as new inputs.
pub async fn list_inputs(dir: &Path, exclude_derived: bool) -> WorkerResult<Vec<PathBuf>> {
    let input_dir_error = |source| WorkerError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(input_dir_error)?;
    let mut inputs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(input_dir_error)? {
        let path = entry.path();
        if !is_video_file(&path) || (exclude_derived && is_derived_file(&path)) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => inputs.push(path),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), "Cannot stat entry, ignoring: {}", e),
        }
    }

    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(inputs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs batches over one input directory.
pub struct BatchOrchestrator {
    config: BatchConfig,
    prober: Arc<dyn AssetProber>,
    sampler: FrameSampler,
    locator: Locator,
    compositor: Compositor,
}

impl BatchOrchestrator {
    /// Orchestrator backed by ffprobe and ffmpeg.
    pub fn new(config: BatchConfig) -> Self {
        let mut encoder = FfmpegEncoder::new(config.encoding.clone());
        if let Some(timeout) = config.encode_timeout {
            encoder = encoder.with_timeout(timeout.as_secs().max(1));
        }
        let compositor = Compositor::new(Arc::new(encoder), config.brand.clone())
            .with_min_output_ratio(config.min_output_ratio);

        Self::with_components(config, Arc::new(FfprobeProber), FrameSampler::ffmpeg(), compositor)
    }

    /// Orchestrator with injected stages.
    pub fn with_components(
        config: BatchConfig,
        prober: Arc<dyn AssetProber>,
        sampler: FrameSampler,
        compositor: Compositor,
    ) -> Self {
        let locator = Locator::new(&config.detector_config());
        Self {
            config,
            prober,
            sampler,
            locator,
            compositor,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Output path the configured variant writes for `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        output_path_for(input, &self.config.output_dir(), self.config.profile.output_suffix())
    }

    /// Process the input directory. At most `limit` assets are processed;
    /// skipped assets do not count towards it.
    ///
    /// Per-asset failures are recorded in the report. Only fatal errors
    /// (unreadable input directory, missing ffmpeg/ffprobe) end the run.
    pub async fn run(&self, limit: Option<usize>) -> WorkerResult<BatchReport> {
        let input_dir = self.config.input_dir();
        let output_dir = self.config.output_dir();

        let resolved_input = tokio::fs::canonicalize(input_dir)
            .await
            .map_err(|source| WorkerError::InputDir {
                path: input_dir.to_path_buf(),
                source,
            })?;
        if !self.config.dry_run {
            tokio::fs::create_dir_all(&output_dir).await?;
        }
        let same_dir = match tokio::fs::canonicalize(&output_dir).await {
            Ok(resolved_output) => resolved_output == resolved_input,
            // Dry run with a missing output dir: nothing there to pick up
            Err(_) => false,
        };

        let inputs = list_inputs(input_dir, same_dir).await?;
        let mut run = BatchRun::new(inputs.iter().map(|p| file_name(p)).collect());

        tokio::fs::create_dir_all(self.config.scratch_root()).await?;

        info!(
            run_id = %run.run_id,
            files = inputs.len(),
            variant = %self.config.profile,
            limit = ?limit,
            dry_run = self.config.dry_run,
            "Batch started"
        );

        for input in &inputs {
            if limit.is_some_and(|limit| run.processed >= limit) {
                info!(limit = ?limit, "Limit reached, stopping");
                break;
            }

            let name = file_name(input);
            let output = self.output_path(input);

            if tokio::fs::try_exists(&output).await.unwrap_or(false) {
                debug!(asset = %name, output = %output.display(), "Output exists, skipping");
                counter!("wmark_assets_total", "outcome" => AssetState::Skipped.as_str())
                    .increment(1);
                run.record(AssetOutcome::skipped(name));
                continue;
            }

            if run.processed > 0 {
                self.pause(run.processed).await;
            }

            let outcome = self.process_asset(input, &output).await?;
            run.record(outcome);
        }

        run.finish();
        info!(
            run_id = %run.run_id,
            processed = run.processed,
            successful = run.successful,
            failed = run.failed,
            skipped = run.skipped,
            "Batch finished"
        );

        Ok(BatchReport::new(
            run,
            self.config.profile,
            self.config.dry_run,
            input_dir,
            output_dir,
        ))
    }

    async fn pause(&self, processed: usize) {
        let delay = if processed % self.config.batch_size == 0 {
            info!(
                processed,
                pause_secs = self.config.batch_delay.as_secs(),
                "Batch boundary, pausing"
            );
            self.config.batch_delay
        } else {
            self.config.asset_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one asset to a terminal state. Returns `Err` only for fatal errors.
    pub async fn process_asset(&self, input: &Path, output: &Path) -> WorkerResult<AssetOutcome> {
        let name = file_name(input);
        let logger = AssetLogger::new(&name, self.config.profile.as_str());
        let span = logger.create_span();

        async {
            let started = Instant::now();
            let mut outcome = AssetOutcome::pending(&name);
            logger.log_start(&output.display().to_string());

            match self.run_stages(input, output, &logger, &mut outcome).await {
                Ok(()) => {
                    advance(&mut outcome, AssetState::Succeeded);
                    logger.log_completion(&format!("{:.1}s", started.elapsed().as_secs_f64()));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let stage = outcome.state;
                    logger.log_error(stage, &e.to_string());
                    outcome.failed_stage = Some(stage);
                    outcome.error = Some(e.to_string());
                    advance(&mut outcome, AssetState::Failed);
                }
            }

            outcome.elapsed_ms = started.elapsed().as_millis() as u64;
            counter!("wmark_assets_total", "outcome" => outcome.state.as_str()).increment(1);
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        input: &Path,
        output: &Path,
        logger: &AssetLogger,
        outcome: &mut AssetOutcome,
    ) -> WorkerResult<()> {
        advance(outcome, AssetState::Sampling);
        logger.log_stage(AssetState::Sampling);

        let asset = self.prober.probe(input).await?;
        if asset.width == 0 || asset.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "no usable video dimensions ({}x{})",
                asset.width, asset.height
            ))
            .into());
        }

        let scratch = tempfile::Builder::new()
            .prefix("wmark-")
            .tempdir_in(self.config.scratch_root())?;
        let frames = self.sampler.sample(&asset, scratch.path()).await;
        outcome.frames_sampled = frames.len();
        if frames.is_empty() {
            logger.log_warning("no frames could be sampled, using orientation fallback");
        }

        advance(outcome, AssetState::Scoring);
        logger.log_stage(AssetState::Scoring);

        let locator = self.locator.clone();
        let located = asset.clone();
        let detection = tokio::task::spawn_blocking(move || locator.locate(&located, &frames))
            .await
            .map_err(|e| WorkerError::task_failed(format!("scoring task: {}", e)))?;

        // Frames are no longer needed; free the scratch space before encoding
        drop(scratch);

        advance(outcome, AssetState::Selecting);
        let selected = detection.selected.clone();
        counter!("wmark_decisions_total", "decision" => selected.decision.as_str()).increment(1);
        info!(
            decision = %selected.decision,
            region = %selected.region.label,
            max_score = selected.max_score,
            frames = detection.frames_sampled,
            "Location selected"
        );
        outcome.top_regions = detection.top(self.config.top_n);
        outcome.location = Some(selected.clone());

        if self.config.dry_run {
            return Ok(());
        }

        advance(outcome, AssetState::Compositing);
        logger.log_stage(AssetState::Compositing);

        let job = self.compositing_job(&asset, output, selected);
        let report = self.compositor.compose(&job).await?;
        debug!(
            output = %report.output.display(),
            output_size = report.output_size,
            input_size = report.input_size,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Output written"
        );
        Ok(())
    }

    fn compositing_job(
        &self,
        asset: &VideoAsset,
        output: &Path,
        selected: SelectedLocation,
    ) -> CompositingJob {
        CompositingJob::new(
            &asset.path,
            output,
            selected,
            asset.orientation(),
            asset.width,
            asset.height,
            self.compositor.style(),
            asset.has_audio,
        )
    }
}

fn advance(outcome: &mut AssetOutcome, next: AssetState) {
    debug_assert!(
        outcome.state.can_transition_to(next),
        "illegal asset transition {} -> {}",
        outcome.state,
        next
    );
    outcome.state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_for() {
        let out = output_path_for(Path::new("/in/My Clip.MOV"), Path::new("/out"), "-clean");
        assert_eq!(out, PathBuf::from("/out/My Clip-clean.MOV"));

        let out = output_path_for(Path::new("/in/a.mp4"), Path::new("/out"), "-enhanced-ai");
        assert_eq!(out, PathBuf::from("/out/a-enhanced-ai.mp4"));
    }

    #[test]
    fn test_video_extensions_case_insensitive() {
        assert!(is_video_file(Path::new("a.mp4")));
        assert!(is_video_file(Path::new("a.MOV")));
        assert!(!is_video_file(Path::new("a.mkv")));
        assert!(!is_video_file(Path::new("mp4")));
    }

    #[test]
    fn test_derived_files() {
        assert!(is_derived_file(Path::new("a-clean.mp4")));
        assert!(is_derived_file(Path::new("a-visual-ai.mov")));
        assert!(is_derived_file(Path::new("a-clean.partial.mp4")));
        assert!(!is_derived_file(Path::new("a.mp4")));
    }

    #[tokio::test]
    async fn test_list_inputs_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.MOV", "notes.txt", "c-clean.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.mp4")).unwrap();

        let names: Vec<_> = list_inputs(dir.path(), true)
            .await
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.MOV", "b.mp4"]);

        let all = list_inputs(dir.path(), false).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_input_dir_is_fatal() {
        let err = list_inputs(Path::new("/nonexistent/wmark"), false).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
