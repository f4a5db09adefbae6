//! Run Configuration
//!
//! Configuration structs for the training and prediction pipeline.

use serde::{Deserialize, Serialize};

use crate::training::Mode;

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Data access and batching configuration
    pub data: DataConfig,
    /// Training loop configuration
    pub training: TrainingConfig,
    /// Learning-rate schedule; `None` keeps the base rate for the whole run
    pub schedule: Option<ScheduleConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            training: TrainingConfig::default(),
            schedule: None,
        }
    }
}

/// Data access and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Table holding the per-event pulse series (graph nodes)
    pub pulsemap: String,
    /// Per-pulse feature columns read from the pulsemap table
    pub features: Vec<String>,
    /// Per-event truth columns read from the `truth` table
    pub truth: Vec<String>,
    /// Events per mini-batch
    pub batch_size: usize,
    /// Background workers for batch construction (0 = build inline)
    pub num_workers: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            pulsemap: "SRTTWOfflinePulses".to_string(),
            features: vec![
                "dom_x".to_string(),
                "dom_y".to_string(),
                "dom_z".to_string(),
                "dom_time".to_string(),
                "charge".to_string(),
            ],
            truth: vec![
                "energy".to_string(),
                "zenith".to_string(),
                "azimuth".to_string(),
            ],
            batch_size: 1024,
            num_workers: 4,
        }
    }
}

/// Training loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Truth column the model is trained against
    pub target: String,
    /// Maximum number of epochs
    pub max_epochs: usize,
    /// Base learning rate, used until a schedule takes over
    pub learning_rate: f64,
    /// Early stopping policy
    pub early_stopping: EarlyStoppingConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target: "energy".to_string(),
            max_epochs: 30,
            learning_rate: 1e-3,
            early_stopping: EarlyStoppingConfig::default(),
        }
    }
}

/// Early stopping policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    /// Whether lower or higher validation metrics are better
    pub mode: Mode,
    /// Minimum improvement over the current best to count as progress
    pub min_delta: f64,
    /// Interpret `min_delta` as a percentage of the current best
    pub percentage: bool,
    /// Consecutive non-improving epochs tolerated before halting.
    /// Zero disables halting entirely.
    pub patience: usize,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Min,
            min_delta: 0.0,
            percentage: false,
            patience: 10,
        }
    }
}

/// Piecewise-linear learning-rate schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Learning rate at step zero
    pub start_lr: f64,
    /// Peak learning rate at the end of the ramp-up phase
    pub max_lr: f64,
    /// Learning rate at the end of the run
    pub end_lr: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_lr: 1e-5,
            max_lr: 1e-3,
            end_lr: 1e-5,
        }
    }
}
