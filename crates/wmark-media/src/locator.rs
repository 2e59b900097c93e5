//! Watermark locator: candidate generation, scoring and selection for one
//! asset.
//!
//! Detector variants are configuration. A `DetectorProfile` picks the output
//! suffix and the image-signal settings; the catalogue, rule table and
//! threshold are shared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::regions::regions;
use crate::sampler::FrameSample;
use crate::scorer::{BoostRule, ImageSignal, RegionScorer};
use crate::selector::{select_location, top_regions, DEFAULT_DETECTION_THRESHOLD};
use wmark_models::{RegionCandidate, ScoredRegion, SelectedLocation, VideoAsset};

/// Named detector variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorProfile {
    /// Label rules only
    #[default]
    Clean,
    /// Label rules plus edge density on 2x upscaled crops
    EnhancedAi,
    /// Label rules plus edge density on native crops
    VisualAi,
}

impl DetectorProfile {
    pub const ALL: [DetectorProfile; 3] = [
        DetectorProfile::Clean,
        DetectorProfile::EnhancedAi,
        DetectorProfile::VisualAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectorProfile::Clean => "clean",
            DetectorProfile::EnhancedAi => "enhanced-ai",
            DetectorProfile::VisualAi => "visual-ai",
        }
    }

    /// Suffix appended to the input stem to name the output file. Must stay
    /// stable: the skip-if-exists check depends on it.
    pub fn output_suffix(self) -> &'static str {
        match self {
            DetectorProfile::Clean => "-clean",
            DetectorProfile::EnhancedAi => "-enhanced-ai",
            DetectorProfile::VisualAi => "-visual-ai",
        }
    }

    pub fn image_signal(self) -> ImageSignal {
        match self {
            DetectorProfile::Clean => ImageSignal::default(),
            DetectorProfile::EnhancedAi => ImageSignal::enabled()
                .with_upscale(2)
                .with_max_delta(0.3),
            DetectorProfile::VisualAi => ImageSignal::enabled(),
        }
    }
}

impl fmt::Display for DetectorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        DetectorProfile::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown detector profile '{}'", s))
    }
}

/// Detection settings shared by all assets of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub profile: DetectorProfile,
    pub threshold: f64,
    pub rules: Vec<BoostRule>,
    pub image_signal: ImageSignal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::for_profile(DetectorProfile::default())
    }
}

impl DetectorConfig {
    pub fn for_profile(profile: DetectorProfile) -> Self {
        Self {
            profile,
            threshold: DEFAULT_DETECTION_THRESHOLD,
            rules: BoostRule::default_rules(),
            image_signal: profile.image_signal(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Everything the locator learned about one asset.
#[derive(Debug, Clone)]
pub struct Detection {
    pub selected: SelectedLocation,
    pub candidates: Vec<RegionCandidate>,
    pub scored: Vec<ScoredRegion>,
    pub frames_sampled: usize,
}

impl Detection {
    /// Best score per label, highest first.
    pub fn top(&self, n: usize) -> Vec<ScoredRegion> {
        top_regions(&self.scored, n)
    }
}

/// Generator -> scorer -> selector for one asset.
#[derive(Debug, Clone)]
pub struct Locator {
    scorer: RegionScorer,
    threshold: f64,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl Locator {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            scorer: RegionScorer::new(config.rules.clone(), config.image_signal.clone()),
            threshold: config.threshold,
        }
    }

    /// Locate the watermark. With no frames nothing is scored and the
    /// selector falls back to the orientation default.
    pub fn locate(&self, asset: &VideoAsset, frames: &[FrameSample]) -> Detection {
        let candidates = regions(asset.width, asset.height);
        let scored = self.scorer.score_frames(frames, &candidates, (asset.width, asset.height));
        let selected = select_location(asset, &scored, self.threshold);

        Detection {
            selected,
            candidates,
            scored,
            frames_sampled: frames.len(),
        }
    }
}
