//! Prediction Driver
//!
//! Runs a trained model over a held-out source and assembles the
//! per-event predictions into a results table, optionally post-processed
//! before it is returned.

use std::path::Path;

use burn::prelude::*;
use tracing::info;

use crate::data::DataLoader;
use crate::error::{RecoError, Result};
use crate::model::GraphNetwork;

/// Post-processing hook applied to the assembled table
pub type PostProcessing = Box<dyn Fn(PredictionTable, &str) -> Result<PredictionTable>>;

/// Tabular prediction results: one row per event
#[derive(Debug, Clone)]
pub struct PredictionTable {
    /// Names of the model's output columns
    pub output_columns: Vec<String>,
    /// Model outputs, one row per event
    pub predictions: Vec<Vec<f32>>,
    /// Event identifiers
    pub event_nos: Vec<i64>,
    /// Name of the truth column carried along
    pub target_name: String,
    /// Truth values, one per event
    pub targets: Vec<f32>,
}

impl PredictionTable {
    /// Assemble a table, checking that all columns line up
    pub fn new(
        output_columns: Vec<String>,
        predictions: Vec<Vec<f32>>,
        event_nos: Vec<i64>,
        target_name: String,
        targets: Vec<f32>,
    ) -> Result<Self> {
        if predictions.len() != event_nos.len() || predictions.len() != targets.len() {
            return Err(RecoError::InvalidState(format!(
                "prediction table columns disagree: {} predictions, {} events, {} targets",
                predictions.len(),
                event_nos.len(),
                targets.len()
            )));
        }
        if let Some(row) = predictions.first() {
            if row.len() != output_columns.len() {
                return Err(RecoError::InvalidState(format!(
                    "model produced {} outputs but {} column names were given",
                    row.len(),
                    output_columns.len()
                )));
            }
        }

        Ok(Self {
            output_columns,
            predictions,
            event_nos,
            target_name,
            targets,
        })
    }

    /// Number of rows (events)
    pub fn len(&self) -> usize {
        self.event_nos.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.event_nos.is_empty()
    }

    /// Full header: output columns, then `event_no`, then the target
    pub fn header(&self) -> Vec<String> {
        let mut header = self.output_columns.clone();
        header.push("event_no".to_string());
        header.push(self.target_name.clone());
        header
    }

    /// Write the table as CSV
    pub fn to_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;
        for row in 0..self.len() {
            let mut record: Vec<String> = self.predictions[row]
                .iter()
                .map(f32::to_string)
                .collect();
            record.push(self.event_nos[row].to_string());
            record.push(self.targets[row].to_string());
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Prediction driver over one inference source
pub struct Predictor<B: Backend> {
    loader: DataLoader,
    target: String,
    output_columns: Vec<String>,
    device: B::Device,
    post_processing: Option<PostProcessing>,
}

impl<B: Backend> Predictor<B> {
    /// Create a predictor
    pub fn new(
        loader: DataLoader,
        target: impl Into<String>,
        output_columns: Vec<String>,
        device: B::Device,
    ) -> Self {
        Self {
            loader,
            target: target.into(),
            output_columns,
            device,
            post_processing: None,
        }
    }

    /// Attach a post-processing hook; its result replaces the raw table
    pub fn with_post_processing(
        mut self,
        post_processing: impl Fn(PredictionTable, &str) -> Result<PredictionTable> + 'static,
    ) -> Self {
        self.post_processing = Some(Box::new(post_processing));
        self
    }

    /// Run the model over the source and assemble the results table.
    ///
    /// The model is flipped into predicting mode first. Pass a module on
    /// an inference backend (for a trained autodiff module, its
    /// `valid()` form) so no gradient state is carried along.
    pub fn predict<M: GraphNetwork<B>>(mut self, model: M) -> Result<PredictionTable> {
        let model = model.with_predicting(true);

        let mut predictions: Vec<Vec<f32>> = Vec::new();
        let mut event_nos: Vec<i64> = Vec::new();
        let mut targets: Vec<f32> = Vec::new();

        for batch in self.loader.iter()? {
            let batch = batch?;
            let output = model.forward(&batch, &self.device);
            let [_, width] = output.dims();
            let values = output
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| RecoError::Internal(format!("prediction readback failed: {e:?}")))?;
            for row in values.chunks(width) {
                predictions.push(row.to_vec());
            }

            let target_values = batch
                .field(&self.target)
                .ok_or_else(|| RecoError::MissingField(self.target.clone()))?;
            targets.extend_from_slice(target_values);
            event_nos.extend_from_slice(batch.event_nos());
        }

        info!(events = event_nos.len(), target = %self.target, "prediction complete");

        let table = PredictionTable::new(
            self.output_columns,
            predictions,
            event_nos,
            self.target.clone(),
            targets,
        )?;

        match self.post_processing {
            Some(post_processing) => post_processing(table, &self.target),
            None => Ok(table),
        }
    }
}
