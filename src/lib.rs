//! Training-loop orchestration for graph-neural-network reconstruction of
//! physics events stored in SQLite databases.
//!
//! # Overview
//!
//! - **Data**: event selections are read from a database's `truth` table,
//!   split deterministically into training and validation subsets, and
//!   served as mini-batches of event graphs with optional background
//!   prefetching ([`data`]).
//! - **Training**: the [`training::Trainer`] and
//!   [`training::MultiDatabaseTrainer`] drivers run the epoch loop over
//!   any [`model::GraphNetwork`], with early stopping
//!   ([`training::EarlyStopping`]) and an optional piecewise-linear
//!   learning-rate schedule ([`training::PiecewiseLinearLr`]).
//! - **Prediction**: [`training::Predictor`] runs a trained model over a
//!   held-out source and assembles a results table, persisted together
//!   with the model artifact by [`training::RunArchive`].

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod training;

pub use config::{DataConfig, EarlyStoppingConfig, RunConfig, ScheduleConfig, TrainingConfig};
pub use data::{
    make_train_validation_loaders, train_validation_split, DataLoader, GraphBatch, RobustScaler,
    SqliteEventDataset,
};
pub use error::{RecoError, Result};
pub use model::{GraphNetwork, LossFunction, MseLoss};
pub use training::{
    timestamped_tag, EarlyStopping, Mode, MultiDatabaseTrainer, PiecewiseLinearLr,
    PredictionTable, Predictor, RunArchive, Trainer, TrainingReport,
};
