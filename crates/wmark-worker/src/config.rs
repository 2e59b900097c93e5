//! Batch configuration.
//!
//! Values come from `WMARK_*` environment variables (a `.env` file is loaded
//! first by the binary), then command-line arguments override them.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};
use wmark_media::compositor::DEFAULT_MIN_OUTPUT_RATIO;
use wmark_media::{DetectorConfig, DetectorProfile, DEFAULT_DETECTION_THRESHOLD};
use wmark_models::{BrandStyle, EncodingConfig};

/// Name of the output directory created under the input directory when none
/// is configured.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "processed";

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned for input videos
    pub input_dir: PathBuf,
    /// Where outputs are written; `<input_dir>/processed` when unset
    pub output_dir: Option<PathBuf>,
    /// Maximum number of assets to process (skipped files do not count)
    pub limit: Option<usize>,
    pub profile: DetectorProfile,
    /// Minimum max-score needed to trust a detection
    pub threshold: f64,
    pub brand: BrandStyle,
    pub encoding: EncodingConfig,
    /// Outputs smaller than this share of the input are discarded
    pub min_output_ratio: f64,
    /// Kill an encode after this long
    pub encode_timeout: Option<Duration>,
    /// Parent for per-asset scratch directories; system temp dir when unset
    pub scratch_root: Option<PathBuf>,
    /// Pause between assets
    pub asset_delay: Duration,
    /// Pause after every `batch_size` processed assets
    pub batch_delay: Duration,
    pub batch_size: usize,
    /// Regions listed per asset in the report
    pub top_n: usize,
    /// Detect and report only, write no video
    pub dry_run: bool,
    /// Write the JSON report here
    pub report_path: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: None,
            limit: None,
            profile: DetectorProfile::default(),
            threshold: DEFAULT_DETECTION_THRESHOLD,
            brand: BrandStyle::default(),
            encoding: EncodingConfig::default(),
            min_output_ratio: DEFAULT_MIN_OUTPUT_RATIO,
            encode_timeout: Some(Duration::from_secs(1800)), // 30 minutes
            scratch_root: None,
            asset_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(10),
            batch_size: 50,
            top_n: 5,
            dry_run: false,
            report_path: None,
        }
    }
}

impl BatchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let profile = match lookup("WMARK_VARIANT") {
            Some(v) => v.parse::<DetectorProfile>().map_err(WorkerError::config_error)?,
            None => defaults.profile,
        };

        let mut brand = defaults.brand.clone();
        if let Some(text) = lookup("WMARK_BRAND_TEXT") {
            brand = brand.with_text(text);
        }
        if let Some(font) = lookup("WMARK_FONT_FILE") {
            brand = brand.with_font_file(font);
        }
        if let Some(color) = lookup("WMARK_BOX_COLOR") {
            brand.box_color = color;
        }
        if let Some(opacity) = lookup("WMARK_BOX_OPACITY").and_then(|s| s.parse().ok()) {
            brand = brand.with_box_opacity(opacity);
        }

        let mut encoding = defaults.encoding.clone();
        if let Some(codec) = lookup("WMARK_CODEC") {
            encoding = encoding.with_codec(codec.parse().map_err(WorkerError::config_error)?);
        }
        if let Some(quality) = lookup("WMARK_QUALITY").and_then(|s| s.parse().ok()) {
            encoding = encoding.with_quality(quality);
        }
        if let Some(preset) = lookup("WMARK_PRESET") {
            encoding = encoding.with_preset(preset);
        }

        let config = Self {
            input_dir: lookup("WMARK_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            output_dir: lookup("WMARK_OUTPUT_DIR").map(PathBuf::from),
            limit: parsed("WMARK_LIMIT").map(|n| n as usize),
            profile,
            threshold: lookup("WMARK_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.threshold),
            brand,
            encoding,
            min_output_ratio: lookup("WMARK_MIN_OUTPUT_RATIO")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_output_ratio),
            encode_timeout: match parsed("WMARK_ENCODE_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.encode_timeout,
            },
            scratch_root: lookup("WMARK_SCRATCH_DIR").map(PathBuf::from),
            asset_delay: parsed("WMARK_ASSET_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.asset_delay),
            batch_delay: parsed("WMARK_BATCH_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.batch_delay),
            batch_size: parsed("WMARK_BATCH_SIZE")
                .map(|n| n as usize)
                .unwrap_or(defaults.batch_size),
            top_n: parsed("WMARK_TOP_N")
                .map(|n| n as usize)
                .unwrap_or(defaults.top_n),
            dry_run: lookup("WMARK_DRY_RUN").map(|v| is_truthy(&v)).unwrap_or(false),
            report_path: lookup("WMARK_REPORT_PATH").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_args(mut self, args: BatchArgs) -> WorkerResult<Self> {
        self.input_dir = args.input_dir;
        if args.limit.is_some() {
            self.limit = args.limit;
        }
        if args.output_dir.is_some() {
            self.output_dir = args.output_dir;
        }
        if let Some(variant) = args.variant {
            self.profile = variant.parse().map_err(WorkerError::config_error)?;
        }
        if let Some(text) = args.brand_text {
            self.brand = self.brand.with_text(text);
        }
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if args.dry_run {
            self.dry_run = true;
        }
        if args.report.is_some() {
            self.report_path = args.report;
        }
        if args.no_delay {
            self.asset_delay = Duration::ZERO;
            self.batch_delay = Duration::ZERO;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> WorkerResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(WorkerError::config_error(format!(
                "threshold must be within 0..=1, got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_output_ratio) {
            return Err(WorkerError::config_error(format!(
                "min output ratio must be within 0..=1, got {}",
                self.min_output_ratio
            )));
        }
        if self.batch_size == 0 {
            return Err(WorkerError::config_error("batch size must be at least 1"));
        }
        if self.brand.text.trim().is_empty() {
            return Err(WorkerError::config_error("brand text must not be empty"));
        }
        Ok(())
    }

    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join(DEFAULT_OUTPUT_SUBDIR))
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::for_profile(self.profile).with_threshold(self.threshold)
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Command line of the `wmark-batch` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wmark-batch",
    version,
    about = "Replace burned-in watermarks across a directory of videos"
)]
pub struct BatchArgs {
    /// Directory containing .mp4/.mov files
    pub input_dir: PathBuf,

    /// Process at most this many files (already-processed files do not count)
    pub limit: Option<usize>,

    /// Output directory [default: <INPUT_DIR>/processed]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Detector variant: clean, enhanced-ai or visual-ai
    #[arg(short, long)]
    pub variant: Option<String>,

    /// Replacement brand text
    #[arg(short, long)]
    pub brand_text: Option<String>,

    /// Detection threshold (0-1)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Detect and report only, write no video
    #[arg(long)]
    pub dry_run: bool,

    /// Write the aggregate report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable the pauses between assets and batches
    #[arg(long)]
    pub no_delay: bool,
}
