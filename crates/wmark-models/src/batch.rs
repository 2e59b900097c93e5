//! Batch run bookkeeping.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::region::{ScoredRegion, SelectedLocation};

/// Unique batch run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one asset inside a batch.
///
/// `Pending -> Sampling -> Scoring -> Selecting -> Compositing -> Succeeded | Failed`,
/// with `Skipped` reachable only from `Pending`. There is no retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Pending,
    Sampling,
    Scoring,
    Selecting,
    Compositing,
    Succeeded,
    Failed,
    Skipped,
}

impl AssetState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssetState::Succeeded | AssetState::Failed | AssetState::Skipped
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: AssetState) -> bool {
        use AssetState::*;
        match (self, next) {
            (Pending, Sampling) | (Pending, Skipped) => true,
            (Sampling, Scoring) | (Scoring, Selecting) | (Selecting, Compositing) => true,
            // Dry runs stop after selection.
            (Selecting, Succeeded) => true,
            (Compositing, Succeeded) => true,
            (s, Failed) => !s.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetState::Pending => "pending",
            AssetState::Sampling => "sampling",
            AssetState::Scoring => "scoring",
            AssetState::Selecting => "selecting",
            AssetState::Compositing => "compositing",
            AssetState::Succeeded => "succeeded",
            AssetState::Failed => "failed",
            AssetState::Skipped => "skipped",
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final record for one asset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetOutcome {
    pub file_name: String,
    pub state: AssetState,
    /// Stage that failed, when `state` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<AssetState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SelectedLocation>,
    /// Highest scored regions, best first, for audit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_regions: Vec<ScoredRegion>,
    pub frames_sampled: usize,
    pub elapsed_ms: u64,
}

impl AssetOutcome {
    /// Fresh record for an asset about to enter the pipeline.
    pub fn pending(file_name: impl Into<String>) -> Self {
        Self {
            state: AssetState::Pending,
            ..Self::skipped(file_name)
        }
    }

    pub fn skipped(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            state: AssetState::Skipped,
            failed_stage: None,
            error: None,
            location: None,
            top_regions: Vec::new(),
            frames_sampled: 0,
            elapsed_ms: 0,
        }
    }
}

/// Counters and outcomes for one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchRun {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Input file names in processing order
    pub files: Vec<String>,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<AssetOutcome>,
}

impl BatchRun {
    pub fn new(files: Vec<String>) -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            files,
            processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            outcomes: Vec::new(),
        }
    }

    /// Fold a terminal outcome into the counters.
    pub fn record(&mut self, outcome: AssetOutcome) {
        match outcome.state {
            AssetState::Skipped => self.skipped += 1,
            AssetState::Succeeded => {
                self.processed += 1;
                self.successful += 1;
            }
            _ => {
                self.processed += 1;
                self.failed += 1;
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Successful share of processed assets, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.successful as f64 / self.processed as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, state: AssetState) -> AssetOutcome {
        AssetOutcome {
            state,
            ..AssetOutcome::skipped(name)
        }
    }

    #[test]
    fn test_counts_exclude_skipped_from_processed() {
        let mut run = BatchRun::new(vec!["a.mp4".into(), "b.mp4".into(), "c.mp4".into()]);
        run.record(outcome("a.mp4", AssetState::Succeeded));
        run.record(outcome("b.mp4", AssetState::Failed));
        run.record(AssetOutcome::skipped("c.mp4"));

        assert_eq!(run.processed, 2);
        assert_eq!(run.processed, run.successful + run.failed);
        assert_eq!(run.skipped, 1);
        assert!((run.success_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_empty_run() {
        let run = BatchRun::new(Vec::new());
        assert_eq!(run.success_rate(), 0.0);
    }

    #[test]
    fn test_state_transitions() {
        assert!(AssetState::Pending.can_transition_to(AssetState::Skipped));
        assert!(AssetState::Compositing.can_transition_to(AssetState::Failed));
        assert!(!AssetState::Sampling.can_transition_to(AssetState::Skipped));
        assert!(!AssetState::Failed.can_transition_to(AssetState::Pending));
        assert!(!AssetState::Succeeded.can_transition_to(AssetState::Failed));
    }
}
