//! Piecewise-Linear Learning-Rate Schedule
//!
//! Ramps linearly from a start rate up to a peak, then linearly down to an
//! end rate. The whole curve is computed once at construction and served
//! step by step through a cursor.

use crate::config::ScheduleConfig;

/// Precomputed piecewise-linear learning-rate curve
#[derive(Debug, Clone)]
pub struct PiecewiseLinearLr {
    curve: Vec<f64>,
    cursor: usize,
}

impl PiecewiseLinearLr {
    /// Build the curve: `steps_up` steps from `start_lr` to `max_lr`, then
    /// `steps_down` steps to `end_lr`. The curve has
    /// `steps_up + steps_down + 1` entries, with the peak at index
    /// `steps_up`.
    ///
    /// # Panics
    ///
    /// Panics when either phase has zero steps.
    pub fn new(steps_up: usize, steps_down: usize, start_lr: f64, max_lr: f64, end_lr: f64) -> Self {
        assert!(steps_up > 0, "schedule needs at least one ramp-up step");
        assert!(steps_down > 0, "schedule needs at least one ramp-down step");

        let slope_up = (max_lr - start_lr) / steps_up as f64;
        let slope_down = (end_lr - max_lr) / steps_down as f64;

        let curve = (0..=steps_up + steps_down)
            .map(|step| {
                if step <= steps_up {
                    step as f64 * slope_up + start_lr
                } else {
                    step as f64 * slope_down + max_lr - slope_down * steps_up as f64
                }
            })
            .collect();

        Self { curve, cursor: 0 }
    }

    /// Size the curve for a training run the way the drivers consume it:
    /// the ramp-up covers half of one source's per-epoch steps, the
    /// ramp-down all remaining steps of the run.
    ///
    /// `source_steps` is the per-epoch batch count of one source,
    /// `total_steps_per_epoch` the batch count across all sources (the two
    /// coincide for a single source).
    pub fn for_run(
        source_steps: usize,
        total_steps_per_epoch: usize,
        max_epochs: usize,
        config: &ScheduleConfig,
    ) -> Self {
        let steps_up = (source_steps / 2).max(1);
        let steps_down = (total_steps_per_epoch * max_epochs)
            .saturating_sub(steps_up)
            .max(1);
        Self::new(
            steps_up,
            steps_down,
            config.start_lr,
            config.max_lr,
            config.end_lr,
        )
    }

    /// The learning rate at the cursor; advances the cursor by one.
    ///
    /// # Panics
    ///
    /// Panics when called more than [`len`](Self::len) times: the caller
    /// sized the curve too small for its run.
    pub fn next(&mut self) -> f64 {
        let lr = self.curve[self.cursor];
        self.cursor += 1;
        lr
    }

    /// Total number of schedule entries
    pub fn len(&self) -> usize {
        self.curve.len()
    }

    /// Whether the curve is empty (never true for a constructed schedule)
    pub fn is_empty(&self) -> bool {
        self.curve.is_empty()
    }

    /// Entries left before the cursor runs out
    pub fn remaining(&self) -> usize {
        self.curve.len() - self.cursor
    }

    /// The full precomputed curve
    pub fn curve(&self) -> &[f64] {
        &self.curve
    }
}
