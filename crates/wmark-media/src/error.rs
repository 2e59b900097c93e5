//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during probing, sampling, scoring or compositing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),

    #[error("Output too small: {actual} bytes, expected at least {minimum}")]
    OutputTooSmall { actual: u64, minimum: u64 },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid region error.
    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion(message.into())
    }

    /// Create a frame extraction error.
    pub fn frame_extraction(message: impl Into<String>) -> Self {
        Self::FrameExtraction(message.into())
    }

    /// Missing external tooling. Only this class may abort a whole batch.
    pub fn is_environment(&self) -> bool {
        matches!(self, MediaError::FfmpegNotFound | MediaError::FfprobeNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_classification() {
        assert!(MediaError::FfmpegNotFound.is_environment());
        assert!(MediaError::FfprobeNotFound.is_environment());
        assert!(!MediaError::ffmpeg_failed("boom", None, Some(1)).is_environment());
        assert!(!MediaError::Timeout(30).is_environment());
    }

    #[test]
    fn test_output_too_small_message() {
        let err = MediaError::OutputTooSmall {
            actual: 10,
            minimum: 300,
        };
        assert_eq!(
            err.to_string(),
            "Output too small: 10 bytes, expected at least 300"
        );
    }
}
