//! Location selection.
//!
//! Reduces all (frame x candidate) scores of an asset to one region. The best
//! region is trusted only above the detection threshold; otherwise the
//! orientation default is used, so every asset gets an actionable region.

use tracing::debug;

use crate::regions::fallback_region;
use wmark_models::{Decision, ScoredRegion, SelectedLocation, VideoAsset};

/// Minimum max-score needed to trust a detected region.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.6;

/// Highest-scoring region; the earliest one wins ties. NaN scores are ignored.
pub fn best_region(scored: &[ScoredRegion]) -> Option<&ScoredRegion> {
    scored
        .iter()
        .filter(|s| !s.score.is_nan())
        .fold(None, |best: Option<&ScoredRegion>, s| match best {
            Some(b) if b.score >= s.score => Some(b),
            _ => Some(s),
        })
}

/// Pick the region to blot for `asset`.
///
/// `Detected` when the maximum score is strictly above `threshold`,
/// `Fallback` (bottom-right portrait, bottom-left landscape) otherwise,
/// including when nothing was scored at all.
pub fn select_location(
    asset: &VideoAsset,
    scored: &[ScoredRegion],
    threshold: f64,
) -> SelectedLocation {
    match best_region(scored) {
        Some(best) if best.score > threshold => {
            debug!(
                asset = %asset.name(),
                label = %best.candidate.label,
                score = best.score,
                frame = %best.frame,
                "Watermark region detected"
            );
            SelectedLocation {
                region: best.candidate.clone(),
                max_score: best.score,
                decision: Decision::Detected,
            }
        }
        best => {
            let max_score = best.map(|b| b.score).unwrap_or(0.0);
            let region = fallback_region(asset.width, asset.height);
            debug!(
                asset = %asset.name(),
                max_score,
                fallback = %region.label,
                "No region above threshold, using orientation fallback"
            );
            SelectedLocation {
                region,
                max_score,
                decision: Decision::Fallback,
            }
        }
    }
}

/// Best score per label, highest first, truncated to `n`. Used for the
/// diagnostic report.
pub fn top_regions(scored: &[ScoredRegion], n: usize) -> Vec<ScoredRegion> {
    let mut best: Vec<ScoredRegion> = Vec::new();
    for s in scored.iter().filter(|s| !s.score.is_nan()) {
        match best.iter_mut().find(|b| b.candidate.label == s.candidate.label) {
            Some(existing) if existing.score >= s.score => {}
            Some(existing) => *existing = s.clone(),
            None => best.push(s.clone()),
        }
    }
    // Stable sort keeps catalogue order among equal scores
    best.sort_by(|a, b| b.score.total_cmp(&a.score));
    best.truncate(n);
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::regions;
    use wmark_models::{FrameTag, Rect, RegionCandidate};

    fn scored(label: &str, score: f64, frame: FrameTag) -> ScoredRegion {
        ScoredRegion {
            candidate: RegionCandidate::new(label, Rect::new(10, 10, 100, 30), 0.5),
            score,
            frame,
        }
    }

    #[test]
    fn test_portrait_detection_scenario() {
        let asset = VideoAsset::new("portrait.mp4", 1080, 1920, 20.0);
        let target = regions(1080, 1920)
            .into_iter()
            .find(|c| c.label == "vertical-bottom-right")
            .unwrap();
        let scored = vec![
            scored("vertical-top-left", 0.30, FrameTag::Start),
            ScoredRegion {
                candidate: target.clone(),
                score: 0.95,
                frame: FrameTag::Middle,
            },
            scored("vertical-bottom-center", 0.75, FrameTag::End),
        ];

        let selected = select_location(&asset, &scored, DEFAULT_DETECTION_THRESHOLD);
        assert_eq!(selected.decision, Decision::Detected);
        assert_eq!(selected.region, target);
        assert!((selected.max_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_landscape_falls_back() {
        let asset = VideoAsset::new("landscape.mp4", 1920, 1080, 20.0);
        let scored = vec![
            scored("top-right", 0.55, FrameTag::Start),
            scored("bottom-right", 0.59, FrameTag::Middle),
            scored("bottom-center", 0.40, FrameTag::End),
        ];

        let selected = select_location(&asset, &scored, DEFAULT_DETECTION_THRESHOLD);
        assert_eq!(selected.decision, Decision::Fallback);
        assert_eq!(selected.region.label, "bottom-left");
        assert!((selected.max_score - 0.59).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let asset = VideoAsset::new("landscape.mp4", 1920, 1080, 20.0);
        let selected = select_location(
            &asset,
            &[scored("bottom-right", 0.6, FrameTag::Start)],
            DEFAULT_DETECTION_THRESHOLD,
        );
        assert_eq!(selected.decision, Decision::Fallback);
    }

    #[test]
    fn test_portrait_fallback_is_bottom_right() {
        let asset = VideoAsset::new("portrait.mp4", 1080, 1920, 20.0);
        let selected = select_location(
            &asset,
            &[scored("vertical-top-left", 0.3, FrameTag::Start)],
            DEFAULT_DETECTION_THRESHOLD,
        );
        assert_eq!(selected.decision, Decision::Fallback);
        assert_eq!(selected.region.label, "vertical-bottom-right");
    }

    #[test]
    fn test_empty_scores_fall_back() {
        let asset = VideoAsset::new("landscape.mp4", 1920, 1080, 0.0);
        let selected = select_location(&asset, &[], DEFAULT_DETECTION_THRESHOLD);
        assert_eq!(selected.decision, Decision::Fallback);
        assert_eq!(selected.max_score, 0.0);
        assert!(selected.region.rect.fits_within(1920, 1080));
    }

    #[test]
    fn test_ties_keep_first() {
        let scored = vec![
            scored("bottom-left", 0.9, FrameTag::Start),
            scored("bottom-right", 0.9, FrameTag::Start),
            scored("top-left", f64::NAN, FrameTag::Start),
        ];
        assert_eq!(best_region(&scored).unwrap().candidate.label, "bottom-left");
    }

    #[test]
    fn test_top_regions_best_per_label() {
        let scored = vec![
            scored("bottom-left", 0.7, FrameTag::Start),
            scored("bottom-right", 0.8, FrameTag::Start),
            scored("bottom-left", 0.95, FrameTag::End),
            scored("top-left", 0.5, FrameTag::End),
        ];

        let top = top_regions(&scored, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].candidate.label, "bottom-left");
        assert_eq!(top[0].frame, FrameTag::End);
        assert_eq!(top[1].candidate.label, "bottom-right");
    }
}
