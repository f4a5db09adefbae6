//! Event Data Module
//!
//! Everything between the SQLite event stores and the training loop:
//! selection queries, per-event graph construction, batching with
//! background prefetch, the deterministic train/validation split and
//! robust feature scaling.

pub mod batch;
pub mod database;
pub mod dataset;
pub mod loader;
pub mod scaler;
pub mod split;

pub use batch::GraphBatch;
pub use database::{read_event_selection, MAX_EVENTS};
pub use dataset::{EventGraph, SqliteEventDataset};
pub use loader::{BatchIter, DataLoader};
pub use scaler::RobustScaler;
pub use split::{train_validation_split, SPLIT_SEED, VALIDATION_FRACTION};

use std::path::Path;

use crate::config::DataConfig;
use crate::error::Result;

/// Build the (training, validation) loader pair for one source.
///
/// The selection (or, without one, the database's full event population)
/// is split 0.67/0.33 with the fixed seed before either loader exists, so
/// the two never overlap and repeated runs see the same split.
pub fn make_train_validation_loaders(
    database: &Path,
    selection: Option<Vec<i64>>,
    config: &DataConfig,
) -> Result<(DataLoader, DataLoader)> {
    let selection = match selection {
        Some(selection) => selection,
        None => read_event_selection(database)?,
    };
    let (train_events, validation_events) =
        train_validation_split(&selection, VALIDATION_FRACTION, SPLIT_SEED);

    let train_dataset = SqliteEventDataset::new(database, config, Some(train_events))?;
    let validation_dataset = SqliteEventDataset::new(database, config, Some(validation_events))?;

    let train_loader = DataLoader::new(
        train_dataset,
        config.batch_size,
        true,
        config.num_workers,
    );
    let validation_loader = DataLoader::new(
        validation_dataset,
        config.batch_size,
        true,
        config.num_workers,
    );
    Ok((train_loader, validation_loader))
}
