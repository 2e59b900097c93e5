//! Aggregate batch report.
//!
//! The console rendering is the audit trail for detection decisions: every
//! processed asset lists its decision and the top scored regions.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::WorkerResult;
use wmark_media::DetectorProfile;
use wmark_models::{AssetOutcome, AssetState, BatchRun};

/// Outcome of one `BatchOrchestrator::run`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub variant: DetectorProfile,
    pub dry_run: bool,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Successful share of processed assets, in percent
    pub success_rate: f64,
    #[serde(flatten)]
    pub run: BatchRun,
}

impl BatchReport {
    pub fn new(
        run: BatchRun,
        variant: DetectorProfile,
        dry_run: bool,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            variant,
            dry_run,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            success_rate: run.success_rate(),
            run,
        }
    }

    pub fn processed(&self) -> usize {
        self.run.processed
    }

    pub fn successful(&self) -> usize {
        self.run.successful
    }

    pub fn failed(&self) -> usize {
        self.run.failed
    }

    pub fn skipped(&self) -> usize {
        self.run.skipped
    }

    pub fn outcome(&self, file_name: &str) -> Option<&AssetOutcome> {
        self.run.outcomes.iter().find(|o| o.file_name == file_name)
    }

    pub fn to_json(&self) -> WorkerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn write_json(&self, path: &Path) -> WorkerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_json()?).await?;
        Ok(())
    }
}

fn write_outcome(f: &mut fmt::Formatter<'_>, outcome: &AssetOutcome) -> fmt::Result {
    match outcome.state {
        AssetState::Skipped => writeln!(f, "  {:<40} skipped (output exists)", outcome.file_name),
        AssetState::Failed => writeln!(
            f,
            "  {:<40} FAILED at {}: {}",
            outcome.file_name,
            outcome.failed_stage.unwrap_or(AssetState::Pending),
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
        _ => {
            match &outcome.location {
                Some(loc) => writeln!(
                    f,
                    "  {:<40} {} {} (max score {:.2}, {} frames)",
                    outcome.file_name,
                    loc.decision,
                    loc.region.label,
                    loc.max_score,
                    outcome.frames_sampled
                )?,
                None => writeln!(f, "  {:<40} {}", outcome.file_name, outcome.state)?,
            }
            for region in &outcome.top_regions {
                writeln!(
                    f,
                    "      {:<28} {:.2}  [{}]",
                    region.candidate.label, region.score, region.frame
                )?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Watermark batch {} ({}{})",
            self.run.run_id,
            self.variant,
            if self.dry_run { ", dry run" } else { "" }
        )?;
        writeln!(f, "  input:  {}", self.input_dir.display())?;
        writeln!(f, "  output: {}", self.output_dir.display())?;
        writeln!(f)?;

        for outcome in &self.run.outcomes {
            write_outcome(f, outcome)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Processed: {}  Successful: {}  Failed: {}  Skipped: {}",
            self.run.processed, self.run.successful, self.run.failed, self.run.skipped
        )?;
        write!(f, "Success rate: {:.1}%", self.success_rate)
    }
}
