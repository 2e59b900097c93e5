//! Region geometry, candidates and detection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pixel rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Non-empty and entirely inside a `frame_width` x `frame_height` frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= frame_width as u64
            && self.bottom() <= frame_height as u64
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A named rectangle that plausibly holds a burned-in watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegionCandidate {
    /// Position label, e.g. "bottom-right" or "vertical-bottom-center"
    pub label: String,
    /// Pixel geometry
    pub rect: Rect,
    /// Prior confidence in [0, 1]
    pub prior_confidence: f64,
}

impl RegionCandidate {
    pub fn new(label: impl Into<String>, rect: Rect, prior_confidence: f64) -> Self {
        Self {
            label: label.into(),
            rect,
            prior_confidence: prior_confidence.clamp(0.0, 1.0),
        }
    }
}

/// Temporal position a frame was sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameTag {
    /// Half a second in
    Start,
    /// 50% of duration
    Middle,
    /// 90% of duration
    End,
    /// Unconditioned first-frame extraction after every offset failed
    First,
}

impl FrameTag {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameTag::Start => "start",
            FrameTag::Middle => "middle",
            FrameTag::End => "end",
            FrameTag::First => "first",
        }
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate scored against one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredRegion {
    pub candidate: RegionCandidate,
    /// Confidence in [0, 1]; 0 when the (frame, region) pair could not be analysed
    pub score: f64,
    pub frame: FrameTag,
}

/// Outcome of the location selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The best region cleared the detection threshold
    Detected,
    /// Orientation default was used
    Fallback,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Detected => "detected",
            Decision::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single region an asset will be blotted and branded at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectedLocation {
    pub region: RegionCandidate,
    /// Highest score seen across all frames and candidates (0 when nothing was scored)
    pub max_score: f64,
    pub decision: Decision,
}
