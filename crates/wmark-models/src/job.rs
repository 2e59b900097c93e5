//! Compositing jobs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::asset::Orientation;
use crate::region::SelectedLocation;

/// Default replacement brand text.
pub const DEFAULT_BRAND_TEXT: &str = "promptlib.ai";
/// Font size used on portrait frames (narrower candidate boxes)
pub const PORTRAIT_FONT_SIZE: u32 = 14;
/// Font size used on landscape frames
pub const LANDSCAPE_FONT_SIZE: u32 = 16;
/// Inset of the brand mark from the blotted region's top-left corner
pub const DEFAULT_BRAND_OFFSET: u32 = 5;

/// Styling of the replacement brand overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BrandStyle {
    /// Text drawn over the blotted region
    #[serde(default = "default_brand_text")]
    pub text: String,
    #[serde(default = "default_portrait_font_size")]
    pub portrait_font_size: u32,
    #[serde(default = "default_landscape_font_size")]
    pub landscape_font_size: u32,
    /// Inset from the region's top-left corner, in pixels
    #[serde(default = "default_brand_offset")]
    pub offset: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    /// Background box colour behind the text
    #[serde(default = "default_box_color")]
    pub box_color: String,
    /// Background box opacity (0.0 to 1.0)
    #[serde(default = "default_box_opacity")]
    pub box_opacity: f32,
    /// Optional TrueType font file; FFmpeg's default font otherwise
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

fn default_brand_text() -> String {
    DEFAULT_BRAND_TEXT.to_string()
}
fn default_portrait_font_size() -> u32 {
    PORTRAIT_FONT_SIZE
}
fn default_landscape_font_size() -> u32 {
    LANDSCAPE_FONT_SIZE
}
fn default_brand_offset() -> u32 {
    DEFAULT_BRAND_OFFSET
}
fn default_font_color() -> String {
    "white".to_string()
}
fn default_box_color() -> String {
    "0x7c3aed".to_string()
}
fn default_box_opacity() -> f32 {
    0.6
}

impl Default for BrandStyle {
    fn default() -> Self {
        Self {
            text: default_brand_text(),
            portrait_font_size: PORTRAIT_FONT_SIZE,
            landscape_font_size: LANDSCAPE_FONT_SIZE,
            offset: DEFAULT_BRAND_OFFSET,
            font_color: default_font_color(),
            box_color: default_box_color(),
            box_opacity: default_box_opacity(),
            font_file: None,
        }
    }
}

impl BrandStyle {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_box_opacity(mut self, opacity: f32) -> Self {
        self.box_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    pub fn font_size_for(&self, orientation: Orientation) -> u32 {
        match orientation {
            Orientation::Portrait => self.portrait_font_size,
            Orientation::Landscape => self.landscape_font_size,
        }
    }
}

/// One blot-and-brand rewrite of a single asset. Created only when the
/// output does not exist yet; consumed once by the compositing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositingJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub location: SelectedLocation,
    pub orientation: Orientation,
    pub frame_width: u32,
    pub frame_height: u32,
    pub brand_text: String,
    pub font_size: u32,
    /// Top-left corner of the brand mark
    pub brand_x: u32,
    pub brand_y: u32,
    /// Whether the input carries audio to stream-copy
    pub has_audio: bool,
}

impl CompositingJob {
    /// Build a job, deriving the font size and the inset brand position.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        location: SelectedLocation,
        orientation: Orientation,
        frame_width: u32,
        frame_height: u32,
        style: &BrandStyle,
        has_audio: bool,
    ) -> Self {
        let rect = location.region.rect;
        Self {
            input_path: input_path.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
            orientation,
            frame_width,
            frame_height,
            brand_text: style.text.clone(),
            font_size: style.font_size_for(orientation),
            brand_x: rect.x.saturating_add(style.offset),
            brand_y: rect.y.saturating_add(style.offset),
            location,
            has_audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Decision, Rect, RegionCandidate};

    fn location(x: u32, y: u32) -> SelectedLocation {
        SelectedLocation {
            region: RegionCandidate::new("bottom-left", Rect::new(x, y, 150, 40), 0.9),
            max_score: 1.0,
            decision: Decision::Detected,
        }
    }

    #[test]
    fn test_job_derives_brand_offset() {
        let job = CompositingJob::new(
            "in.mp4",
            "out.mp4",
            location(20, 1020),
            Orientation::Landscape,
            1920,
            1080,
            &BrandStyle::default(),
            true,
        );
        assert_eq!((job.brand_x, job.brand_y), (25, 1025));
        assert_eq!(job.font_size, LANDSCAPE_FONT_SIZE);
    }

    #[test]
    fn test_portrait_font_is_smaller() {
        let style = BrandStyle::default();
        assert!(
            style.font_size_for(Orientation::Portrait)
                < style.font_size_for(Orientation::Landscape)
        );
    }

    #[test]
    fn test_brand_style_defaults_from_empty_json() {
        let style: BrandStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style, BrandStyle::default());
    }
}
