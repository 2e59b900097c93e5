//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cannot read input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage task failed: {0}")]
    TaskFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] wmark_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// Errors that end the whole run rather than a single asset.
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::ConfigError(_) | WorkerError::InputDir { .. } => true,
            WorkerError::Media(e) => e.is_environment(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmark_media::MediaError;

    #[test]
    fn test_fatal_classification() {
        assert!(WorkerError::from(MediaError::FfmpegNotFound).is_fatal());
        assert!(WorkerError::config_error("bad limit").is_fatal());
        assert!(!WorkerError::from(MediaError::Timeout(60)).is_fatal());
        assert!(!WorkerError::task_failed("panicked").is_fatal());
    }
}
