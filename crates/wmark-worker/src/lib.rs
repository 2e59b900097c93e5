//! Batch watermark replacement worker.
//!
//! This crate provides:
//! - Batch orchestration with skip/resume and per-asset failure isolation
//! - Environment and command-line configuration
//! - Structured per-asset logging
//! - Console and JSON batch reports

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod report;

pub use config::{BatchArgs, BatchConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, AssetLogger};
pub use orchestrator::{list_inputs, output_path_for, BatchOrchestrator};
pub use report::BatchReport;
