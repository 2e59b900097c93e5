//! Asset metadata from ffprobe.
//!
//! Only what detection and compositing need: display dimensions (rotation
//! applied), duration for sample offsets, size for the output guard, and
//! whether there is audio to copy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use wmark_models::VideoAsset;

/// Parsed ffprobe result for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Seconds, 0 when neither container nor stream reports one
    pub duration: f64,
    /// Display width, rotation applied
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub size: u64,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeDoc {
    format: ProbeContainer,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeContainer {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<StreamTags>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<i32>,
}

/// Run ffprobe on `path`.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: ProbeDoc = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("no video stream".to_string()))?;

    let (mut width, mut height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaError::InvalidVideo(
                "video stream reports no dimensions".to_string(),
            ))
        }
    };

    // Phone footage often stores landscape pixels plus a 90 degree rotation
    if rotation_degrees(video) % 180 != 0 {
        std::mem::swap(&mut width, &mut height);
    }

    // Container duration first, stream duration as fallback
    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoInfo {
        duration,
        width,
        height,
        codec: video.codec_name.clone().unwrap_or_default(),
        size,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

fn rotation_degrees(stream: &ProbeStream) -> i32 {
    let from_side_data = stream.side_data_list.iter().find_map(|d| d.rotation);
    let from_tags = stream
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.parse::<i32>().ok());
    from_side_data.or(from_tags).unwrap_or(0).abs()
}

/// Source of `VideoAsset`s. The orchestrator depends on this seam so batches
/// can run against fakes in tests.
#[async_trait]
pub trait AssetProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoAsset>;
}

/// `AssetProber` backed by the ffprobe CLI.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber;

#[async_trait]
impl AssetProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<VideoAsset> {
        let info = probe_video(path).await?;
        let size = if info.size > 0 {
            info.size
        } else {
            tokio::fs::metadata(path).await?.len()
        };

        Ok(VideoAsset::new(path, info.width, info.height, info.duration)
            .with_size(size)
            .with_audio(info.has_audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"duration": "12.480000", "size": "5242880"}
    }"#;

    #[test]
    fn test_parse_landscape() {
        let info = parse_probe_output(LANDSCAPE_JSON.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.duration - 12.48).abs() < 1e-9);
        assert_eq!(info.size, 5_242_880);
        assert!(info.has_audio);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "side_data_list": [{"rotation": -90}]}],
            "format": {}
        }"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.duration, 0.0);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_missing_video() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json.as_bytes()),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let result = FfprobeProber.probe(Path::new("/nonexistent/clip.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
