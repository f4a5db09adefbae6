//! Training Module
//!
//! The orchestration core: early stopping, the piecewise-linear
//! learning-rate schedule, the single- and multi-database training
//! drivers, the prediction driver and run archiving.

pub mod archive;
pub mod early_stopping;
pub mod predictor;
pub mod schedule;
pub mod trainer;

pub use archive::{timestamped_tag, RunArchive};
pub use early_stopping::{EarlyStopping, Mode};
pub use predictor::{PostProcessing, PredictionTable, Predictor};
pub use schedule::PiecewiseLinearLr;
pub use trainer::{MultiDatabaseTrainer, Trainer, TrainingReport};
