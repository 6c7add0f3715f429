//! Run configuration for [`crate::optimize_type`].

use serde::{Deserialize, Serialize};

use crate::adam::AdamConfig;

/// Top-level configuration for one type optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// Adam learning rate.
    pub lr: f64,

    /// Requested iteration count; rounded to the nearest multiple of ten.
    pub nb_iter: usize,

    /// Tolerance used when the type derives its bounds.
    pub eps: f64,

    /// Whether to draw sample images at every checkpoint.
    pub show_examples: bool,

    /// Tokens drawn per checkpoint row.
    pub samples_per_row: usize,

    /// Number of evenly spaced checkpoints per run.
    pub checkpoint_rows: usize,

    /// Seed for the diagnostic token sampler.
    pub seed: u64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            nb_iter: 1000,
            eps: 1e-4,
            show_examples: true,
            samples_per_row: 4,
            checkpoint_rows: 10,
            seed: 0,
        }
    }
}

impl OptimizeConfig {
    pub fn new(lr: f64, nb_iter: usize, eps: f64) -> Self {
        Self {
            lr,
            nb_iter,
            eps,
            ..Self::default()
        }
    }

    pub fn with_show_examples(mut self, show: bool) -> Self {
        self.show_examples = show;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_samples_per_row(mut self, n: usize) -> Self {
        self.samples_per_row = n;
        self
    }

    pub fn adam(&self) -> AdamConfig {
        AdamConfig::with_lr(self.lr)
    }

    /// Iterations actually run.
    pub fn effective_iterations(&self) -> usize {
        round_to_ten(self.nb_iter)
    }

    /// Iterations between checkpoints; zero means no checkpoints.
    pub fn checkpoint_interval(&self) -> usize {
        self.effective_iterations() / self.checkpoint_rows.max(1)
    }
}

/// Round to the nearest multiple of ten, ties to the even multiple
/// (5 -> 0, 15 -> 20, 25 -> 20). Counts whose upper multiple does not fit
/// in `usize` round down.
pub fn round_to_ten(n: usize) -> usize {
    let tens = n / 10;
    let rest = n % 10;
    let up = match rest {
        0..=4 => false,
        5 => tens % 2 == 1,
        _ => true,
    };
    let down = tens * 10;
    if up {
        down.checked_add(10).unwrap_or(down)
    } else {
        down
    }
}
