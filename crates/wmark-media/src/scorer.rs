//! Region scoring.
//!
//! score = prior + first matching label boost + optional image delta,
//! capped at 1.0 and never below the prior. The label rule table alone is
//! reproducible; the image delta is a cheap edge-density proxy for
//! "text-like" pixels and is bounded so the rules dominate.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::sampler::FrameSample;
use wmark_models::{RegionCandidate, ScoredRegion};

/// Upper bound for the image-based delta.
pub const MAX_IMAGE_DELTA: f64 = 0.3;

/// `label substring -> additive boost`. Rules are tried in order and only
/// the first match applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    pub pattern: String,
    pub boost: f64,
}

impl BoostRule {
    /// Negative boosts are clamped to zero so scores never drop below the prior.
    pub fn new(pattern: impl Into<String>, boost: f64) -> Self {
        Self {
            pattern: pattern.into(),
            boost: boost.max(0.0),
        }
    }

    /// The position bias of the source corpus: bottom-right most common,
    /// then bottom-left, then any other bottom slot.
    pub fn default_rules() -> Vec<BoostRule> {
        vec![
            BoostRule::new("bottom-right", 0.20),
            BoostRule::new("bottom-left", 0.10),
            BoostRule::new("bottom", 0.05),
        ]
    }
}

/// Settings for the optional image-based adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSignal {
    pub enabled: bool,
    /// Largest delta the signal may add (clamped to `MAX_IMAGE_DELTA`)
    pub max_delta: f64,
    /// Integer upscale applied to the crop before measuring
    pub upscale: u32,
    /// Luma gradient that counts as an edge (0-255)
    pub edge_threshold: u8,
    /// Edge density at which the full delta is granted
    pub saturation_density: f64,
}

impl Default for ImageSignal {
    fn default() -> Self {
        Self {
            enabled: false,
            max_delta: 0.15,
            upscale: 1,
            edge_threshold: 40,
            saturation_density: 0.25,
        }
    }
}

impl ImageSignal {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_upscale(mut self, factor: u32) -> Self {
        self.upscale = factor.clamp(1, 4);
        self
    }

    pub fn with_max_delta(mut self, delta: f64) -> Self {
        self.max_delta = delta;
        self
    }

    fn bounded_max_delta(&self) -> f64 {
        if self.max_delta.is_finite() {
            self.max_delta.clamp(0.0, MAX_IMAGE_DELTA)
        } else {
            0.0
        }
    }
}

/// Scores candidates against sampled frames.
#[derive(Debug, Clone)]
pub struct RegionScorer {
    rules: Vec<BoostRule>,
    image_signal: ImageSignal,
}

impl Default for RegionScorer {
    fn default() -> Self {
        Self::new(BoostRule::default_rules(), ImageSignal::default())
    }
}

impl RegionScorer {
    pub fn new(rules: Vec<BoostRule>, image_signal: ImageSignal) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| BoostRule::new(r.pattern, r.boost))
            .collect();
        Self { rules, image_signal }
    }

    /// Boost of the first rule whose pattern occurs in `label`.
    pub fn rule_boost(&self, label: &str) -> f64 {
        self.rules
            .iter()
            .find(|r| label.contains(r.pattern.as_str()))
            .map(|r| r.boost)
            .unwrap_or(0.0)
    }

    /// Score one (frame, region) pair. Analysis failures score 0.
    pub fn score(&self, frame: &FrameSample, region: &RegionCandidate) -> f64 {
        match self.try_score(&frame.image, region) {
            Ok(score) => score,
            Err(e) => {
                debug!(
                    label = %region.label,
                    frame = %frame.tag,
                    "Region analysis failed, scoring 0: {}", e
                );
                0.0
            }
        }
    }

    /// Score one region against a decoded frame.
    pub fn try_score(&self, image: &RgbImage, region: &RegionCandidate) -> MediaResult<f64> {
        let rect = region.rect;
        if !rect.fits_within(image.width(), image.height()) {
            return Err(MediaError::invalid_region(format!(
                "{} ({}) outside {}x{} frame",
                region.label,
                rect,
                image.width(),
                image.height()
            )));
        }

        let prior = region.prior_confidence;
        let mut score = prior + self.rule_boost(&region.label);

        if self.image_signal.enabled {
            score += self.image_delta(image, region)?;
        }

        Ok(score.min(1.0).max(prior))
    }

    /// Score every candidate against every frame, frame-major.
    ///
    /// Candidates are laid out for `frame_size`, the probed display size. A
    /// frame decoded at any other size scores 0 for every candidate, since
    /// a crop that happens to fit would cover the wrong part of the picture.
    pub fn score_frames(
        &self,
        frames: &[FrameSample],
        candidates: &[RegionCandidate],
        frame_size: (u32, u32),
    ) -> Vec<ScoredRegion> {
        frames
            .iter()
            .flat_map(|frame| {
                let usable = frame.image.dimensions() == frame_size;
                if !usable {
                    debug!(
                        frame = %frame.tag,
                        expected = ?frame_size,
                        actual = ?frame.image.dimensions(),
                        "Frame size differs from probed size, scoring 0"
                    );
                }
                candidates.iter().map(move |candidate| ScoredRegion {
                    candidate: candidate.clone(),
                    score: if usable {
                        self.score(frame, candidate)
                    } else {
                        0.0
                    },
                    frame: frame.tag,
                })
            })
            .collect()
    }

    fn image_delta(&self, image: &RgbImage, region: &RegionCandidate) -> MediaResult<f64> {
        let rect = region.rect;
        let crop = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
        let gray = imageops::grayscale(&crop);

        let factor = self.image_signal.upscale.max(1);
        let gray = if factor > 1 {
            imageops::resize(&gray, rect.width * factor, rect.height * factor, FilterType::Triangle)
        } else {
            gray
        };

        let density = edge_density(&gray, self.image_signal.edge_threshold);
        let saturation = self.image_signal.saturation_density.max(f64::EPSILON);
        Ok(self.image_signal.bounded_max_delta() * (density / saturation).min(1.0))
    }
}

/// Fraction of interior pixels whose central-difference gradient exceeds
/// `threshold`. Regions under 3x3 have no interior and score 0.
pub fn edge_density(gray: &GrayImage, threshold: u8) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let luma = |x: u32, y: u32| gray.get_pixel(x, y)[0] as i32;
    let threshold = threshold as i32;
    let mut edges = 0u64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (luma(x + 1, y) - luma(x - 1, y)).abs();
            let gy = (luma(x, y + 1) - luma(x, y - 1)).abs();
            if gx.max(gy) > threshold {
                edges += 1;
            }
        }
    }

    edges as f64 / ((w - 2) as u64 * (h - 2) as u64) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use wmark_models::{FrameTag, Rect};

    fn frame(image: RgbImage) -> FrameSample {
        FrameSample {
            tag: FrameTag::Middle,
            offset: Some(5.0),
            image,
            path: "frame_middle.png".into(),
        }
    }

    fn flat_frame(w: u32, h: u32) -> FrameSample {
        frame(RgbImage::from_pixel(w, h, Rgb([90, 90, 90])))
    }

    fn striped(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if (x / 2) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn candidate(label: &str, prior: f64) -> RegionCandidate {
        RegionCandidate::new(label, Rect::new(10, 10, 40, 20), prior)
    }

    #[test]
    fn test_rule_table_first_match_only() {
        let scorer = RegionScorer::default();
        assert!((scorer.rule_boost("bottom-right") - 0.20).abs() < 1e-9);
        assert!((scorer.rule_boost("vertical-bottom-right") - 0.20).abs() < 1e-9);
        assert!((scorer.rule_boost("bottom-left") - 0.10).abs() < 1e-9);
        assert!((scorer.rule_boost("vertical-bottom-center") - 0.05).abs() < 1e-9);
        assert_eq!(scorer.rule_boost("top-left"), 0.0);
        assert_eq!(scorer.rule_boost("vertical-mid-right"), 0.0);
    }

    #[test]
    fn test_score_applies_boost_and_cap() {
        let scorer = RegionScorer::default();
        let f = flat_frame(100, 100);

        assert!((scorer.score(&f, &candidate("bottom-center", 0.70)) - 0.75).abs() < 1e-9);
        assert!((scorer.score(&f, &candidate("bottom-left", 0.85)) - 0.95).abs() < 1e-9);
        assert!((scorer.score(&f, &candidate("bottom-right", 0.90)) - 1.0).abs() < 1e-9);
        assert!((scorer.score(&f, &candidate("top-left", 0.50)) - 0.50).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_monotonic_and_bounded() {
        let f = frame(striped(100, 100));
        let scorers = [
            RegionScorer::default(),
            RegionScorer::new(
                BoostRule::default_rules(),
                ImageSignal::enabled().with_upscale(2),
            ),
            RegionScorer::new(vec![BoostRule::new("bottom", -0.5)], ImageSignal::default()),
        ];

        for scorer in &scorers {
            for label in [
                "bottom-right",
                "bottom-left",
                "bottom-center",
                "top-left",
                "vertical-mid-left",
            ] {
                for prior in [0.0, 0.3, 0.6, 0.9, 1.0] {
                    let c = candidate(label, prior);
                    let s = scorer.score(&f, &c);
                    assert!(s >= c.prior_confidence, "{} {} -> {}", label, prior, s);
                    assert!(s <= 1.0, "{} {} -> {}", label, prior, s);
                }
            }
        }
    }

    #[test]
    fn test_out_of_bounds_region_scores_zero() {
        let scorer = RegionScorer::default();
        let c = RegionCandidate::new("bottom-right", Rect::new(90, 90, 40, 20), 0.9);
        assert_eq!(scorer.score(&flat_frame(100, 100), &c), 0.0);
        assert!(matches!(
            scorer.try_score(&flat_frame(100, 100).image, &c),
            Err(MediaError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_image_signal_rewards_edges() {
        let scorer = RegionScorer::new(Vec::new(), ImageSignal::enabled().with_max_delta(0.2));
        let c = candidate("top-left", 0.3);

        let flat = scorer.score(&flat_frame(100, 100), &c);
        assert!((flat - 0.3).abs() < 1e-9);

        let textured = scorer.score(&frame(striped(100, 100)), &c);
        assert!((textured - 0.5).abs() < 1e-9, "got {}", textured);
    }

    #[test]
    fn test_image_delta_is_bounded() {
        let scorer = RegionScorer::new(Vec::new(), ImageSignal::enabled().with_max_delta(5.0));
        let s = scorer.score(&frame(striped(100, 100)), &candidate("top-left", 0.1));
        assert!(s <= 0.1 + MAX_IMAGE_DELTA + 1e-9);
    }

    #[test]
    fn test_edge_density() {
        let flat = GrayImage::from_pixel(10, 10, Luma([50]));
        assert_eq!(edge_density(&flat, 40), 0.0);

        let stripes = GrayImage::from_fn(10, 10, |x, _| {
            if (x / 2) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        assert!((edge_density(&stripes, 40) - 1.0).abs() < 1e-9);

        assert_eq!(edge_density(&GrayImage::new(2, 2), 40), 0.0);
    }

    #[test]
    fn test_score_frames_is_frame_major() {
        let scorer = RegionScorer::default();
        let mut second = flat_frame(100, 100);
        second.tag = FrameTag::End;
        let frames = vec![flat_frame(100, 100), second];
        let candidates = vec![candidate("bottom-left", 0.9), candidate("top-left", 0.5)];

        let scored = scorer.score_frames(&frames, &candidates, (100, 100));
        assert_eq!(scored.len(), 4);
        assert_eq!(scored[0].frame, FrameTag::Middle);
        assert_eq!(scored[1].candidate.label, "top-left");
        assert_eq!(scored[2].frame, FrameTag::End);
    }

    #[test]
    fn test_wrong_size_frame_scores_zero_everywhere() {
        let scorer = RegionScorer::new(BoostRule::default_rules(), ImageSignal::enabled());
        let frames = vec![frame(striped(100, 100))];
        // top-left fits the smaller frame, bottom-right does not
        let candidates = vec![
            candidate("top-left", 0.5),
            RegionCandidate::new("bottom-right", Rect::new(150, 150, 40, 20), 0.9),
        ];

        let scored = scorer.score_frames(&frames, &candidates, (200, 200));
        assert_eq!(scored.len(), 2);
        assert!(scored.iter().all(|s| s.score == 0.0));

        let scored = scorer.score_frames(&frames, &candidates[..1], (100, 100));
        assert!(scored[0].score > 0.5);
    }
}
