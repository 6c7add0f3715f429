//! Run summary for one type optimization.

use std::path::Path;

use bpl_types::BplResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OptimizeConfig;

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Serializable record of a run: configuration, trajectory and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub config: OptimizeConfig,
    pub state: RunState,
    /// Log-likelihood per iteration, in iteration order.
    pub scores: Vec<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationReport {
    pub fn new(config: OptimizeConfig) -> Self {
        Self {
            config,
            state: RunState::Pending,
            scores: Vec::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, scores: Vec<f64>) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        self.scores = scores;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn initial_score(&self) -> Option<f64> {
        self.scores.first().copied()
    }

    pub fn final_score(&self) -> Option<f64> {
        self.scores.last().copied()
    }

    /// Highest score and the iteration it was recorded at.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .fold(None, |best, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            })
    }

    pub fn to_json(&self) -> BplResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> BplResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
