//! Structured logging for batch runs.
//!
//! `init_tracing` installs the subscriber used by the binaries; `AssetLogger`
//! keeps per-asset lifecycle lines consistent.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wmark_models::AssetState;

/// Install the global subscriber: ANSI text by default, JSON when
/// `LOG_FORMAT=json`. `RUST_LOG` replaces the default `wmark=info` filter.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wmark=info"));

    let result = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };

    // Already installed (tests, embedding hosts)
    let _ = result;
}

/// Per-asset logger carrying the file name and detector variant.
#[derive(Debug, Clone)]
pub struct AssetLogger {
    asset: String,
    variant: String,
}

impl AssetLogger {
    pub fn new(asset: &str, variant: &str) -> Self {
        Self {
            asset: asset.to_string(),
            variant: variant.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            asset = %self.asset,
            variant = %self.variant,
            "Asset started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: AssetState) {
        info!(
            asset = %self.asset,
            variant = %self.variant,
            stage = %stage,
            "Asset stage"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            asset = %self.asset,
            variant = %self.variant,
            "Asset warning: {}", message
        );
    }

    /// Log a failure at `stage`.
    pub fn log_error(&self, stage: AssetState, message: &str) {
        error!(
            asset = %self.asset,
            variant = %self.variant,
            stage = %stage,
            "Asset failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            asset = %self.asset,
            variant = %self.variant,
            "Asset completed: {}", message
        );
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Span grouping every line logged while this asset is in flight.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "asset",
            asset = %self.asset,
            variant = %self.variant
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_logger_creation() {
        let logger = AssetLogger::new("clip.mp4", "clean");
        assert_eq!(logger.asset(), "clip.mp4");
        assert_eq!(logger.variant(), "clean");
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
        AssetLogger::new("clip.mp4", "clean").log_stage(AssetState::Sampling);
    }
}
