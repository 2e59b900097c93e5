//! Re-encode settings for the compositing pass.
//!
//! The blot-and-brand graph rewrites pixels, so video always goes through an
//! encoder. Audio never does; the compositor stream-copies it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visually lossless for the typical 1080p social clip.
pub const DEFAULT_QUALITY: u8 = 18;
pub const DEFAULT_PRESET: &str = "fast";
/// Keeps outputs playable in browsers and phones after filtering.
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// H.264 encoder used for the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// Software x264
    #[default]
    X264,
    /// NVIDIA hardware encoder
    Nvenc,
}

impl VideoCodec {
    pub fn encoder_name(self) -> &'static str {
        match self {
            VideoCodec::X264 => "libx264",
            VideoCodec::Nvenc => "h264_nvenc",
        }
    }

    /// Constant-quality flag understood by the encoder.
    fn quality_flag(self) -> &'static str {
        match self {
            VideoCodec::X264 => "-crf",
            VideoCodec::Nvenc => "-cq",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x264" | "libx264" | "cpu" => Ok(VideoCodec::X264),
            "nvenc" | "h264_nvenc" | "gpu" => Ok(VideoCodec::Nvenc),
            other => Err(format!("unknown video codec '{}'", other)),
        }
    }
}

/// Encoder settings for the compositing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    #[serde(default)]
    pub codec: VideoCodec,
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Constant-quality level, 0-51, lower is better (CRF or CQ)
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// Appended verbatim after the generated video arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_quality() -> u8 {
    DEFAULT_QUALITY
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: VideoCodec::default(),
            preset: default_preset(),
            quality: DEFAULT_QUALITY,
            pixel_format: default_pixel_format(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Clamped to the encoders' 0-51 range.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(51);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// `-c:v ... -preset ... <quality flag> ... -pix_fmt ...` plus extras.
    pub fn to_video_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-c:v",
            self.codec.encoder_name(),
            "-preset",
            &self.preset,
            self.codec.quality_flag(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.quality.to_string());
        args.push("-pix_fmt".to_string());
        args.push(self.pixel_format.clone());
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
    }

    #[test]
    fn test_software_defaults() {
        let args = EncodingConfig::default().to_video_args();
        assert_eq!(pair(&args, "-c:v").as_deref(), Some("libx264"));
        assert_eq!(pair(&args, "-crf").as_deref(), Some("18"));
        assert_eq!(pair(&args, "-pix_fmt").as_deref(), Some("yuv420p"));
        assert!(!args.iter().any(|a| a.starts_with("-c:a")));
    }

    #[test]
    fn test_nvenc_switches_quality_flag() {
        let args = EncodingConfig::default()
            .with_codec(VideoCodec::Nvenc)
            .with_quality(99)
            .to_video_args();
        assert_eq!(pair(&args, "-c:v").as_deref(), Some("h264_nvenc"));
        assert_eq!(pair(&args, "-cq").as_deref(), Some("51"));
        assert!(pair(&args, "-crf").is_none());
    }

    #[test]
    fn test_codec_names() {
        assert_eq!("GPU".parse::<VideoCodec>().unwrap(), VideoCodec::Nvenc);
        assert_eq!("libx264".parse::<VideoCodec>().unwrap(), VideoCodec::X264);
        assert!("vp9".parse::<VideoCodec>().is_err());
    }

    #[test]
    fn test_extra_args_come_last() {
        let mut config = EncodingConfig::default();
        config.extra_args = vec!["-tune".into(), "film".into()];
        let args = config.to_video_args();
        assert_eq!(&args[args.len() - 2..], ["-tune", "film"]);
    }
}
