//! Early Stopping
//!
//! Tracks a per-epoch validation metric, decides when training should
//! halt, and retains a snapshot of the best model seen so far.

use serde::{Deserialize, Serialize};

use crate::config::EarlyStoppingConfig;
use crate::error::{RecoError, Result};

/// Direction of metric improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Lower metric values are better (losses)
    Min,
    /// Higher metric values are better (accuracies)
    Max,
}

/// Early-stopping tracker.
///
/// One `step` per epoch with the validation metric and the current model.
/// Returns `true` when training should halt. The tracker keeps a clone of
/// the model from its best epoch; [`EarlyStopping::best_params`] hands it
/// back for the post-loop restore.
///
/// A `patience` of zero disables halting entirely: every step counts as an
/// improvement (best and snapshot keep updating) and `step` never returns
/// `true`, not even for NaN.
#[derive(Debug)]
pub struct EarlyStopping<M> {
    mode: Mode,
    min_delta: f64,
    percentage: bool,
    patience: usize,
    best: Option<f64>,
    num_bad_epochs: usize,
    best_params: Option<M>,
}

impl<M: Clone> EarlyStopping<M> {
    /// Create a tracker.
    ///
    /// `min_delta` is the minimum improvement over the current best that
    /// counts as progress; with `percentage` it is read as a percentage of
    /// the current best instead of an absolute difference.
    pub fn new(mode: Mode, min_delta: f64, percentage: bool, patience: usize) -> Self {
        Self {
            mode,
            min_delta,
            percentage,
            patience,
            best: None,
            num_bad_epochs: 0,
            best_params: None,
        }
    }

    /// Create a tracker from configuration
    pub fn from_config(config: &EarlyStoppingConfig) -> Self {
        Self::new(
            config.mode,
            config.min_delta,
            config.percentage,
            config.patience,
        )
    }

    /// Record one epoch's metric; returns `true` when training should halt.
    ///
    /// NaN metrics halt immediately (unless halting is disabled) and never
    /// touch the best value or the snapshot. The first real metric becomes
    /// the initial best and captures the first snapshot, so a run whose
    /// best epoch is its first can still restore.
    pub fn step(&mut self, metric: f64, model: &M) -> bool {
        if metric.is_nan() {
            return self.patience > 0;
        }

        let Some(best) = self.best else {
            self.best = Some(metric);
            self.best_params = Some(model.clone());
            return false;
        };

        if self.patience == 0 || is_better(self.mode, self.percentage, self.min_delta, metric, best)
        {
            self.num_bad_epochs = 0;
            self.best = Some(metric);
            self.best_params = Some(model.clone());
        } else {
            self.num_bad_epochs += 1;
        }

        self.patience > 0 && self.num_bad_epochs >= self.patience
    }

    /// Best metric observed so far
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Consecutive non-improving epochs since the last improvement
    pub fn bad_epochs(&self) -> usize {
        self.num_bad_epochs
    }

    /// The retained best-model snapshot.
    ///
    /// Errors when no metric was ever recorded (no snapshot exists).
    pub fn best_params(&self) -> Result<&M> {
        self.best_params.as_ref().ok_or(RecoError::NoBestParameters)
    }
}

/// Improvement predicate for a metric against the current best
fn is_better(mode: Mode, percentage: bool, min_delta: f64, metric: f64, best: f64) -> bool {
    match (mode, percentage) {
        (Mode::Min, false) => metric < best - min_delta,
        (Mode::Max, false) => metric > best + min_delta,
        (Mode::Min, true) => metric < best - best * min_delta / 100.0,
        (Mode::Max, true) => metric > best + best * min_delta / 100.0,
    }
}
