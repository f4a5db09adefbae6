//! Model and Loss Seams
//!
//! The training drivers are generic over the network and the loss, so the
//! architecture itself stays outside this crate: anything that can map a
//! [`GraphBatch`] to per-event predictions can be trained, validated and
//! run through the predictor.

use burn::prelude::*;

use crate::data::GraphBatch;
use crate::error::Result;

/// A network over batches of event graphs.
///
/// Implementations produce one prediction row per event in the batch.
/// Implement it for a generic backend so the same module type serves the
/// autodiff backend during training and the inner backend during
/// validation and prediction.
pub trait GraphNetwork<B: Backend> {
    /// Forward pass over one mini-batch, `[batch.len(), output_dim]`
    fn forward(&self, batch: &GraphBatch, device: &B::Device) -> Tensor<B, 2>;

    /// Flip the inference-time predicting flag.
    ///
    /// Networks whose forward pass differs at prediction time (e.g. ones
    /// that undo a target transform) override this; the default is a
    /// no-op. The predictor sets it before its first batch.
    fn with_predicting(self, _predicting: bool) -> Self
    where
        Self: Sized,
    {
        self
    }
}

/// A loss over (prediction, batch, target column).
///
/// The batch is passed whole so losses can read whatever truth fields they
/// need; the common case reads exactly the configured target column.
pub trait LossFunction<B: Backend> {
    /// Scalar loss for one mini-batch
    fn forward(
        &self,
        prediction: Tensor<B, 2>,
        batch: &GraphBatch,
        target: &str,
        device: &B::Device,
    ) -> Result<Tensor<B, 1>>;
}

/// Mean-squared-error regression loss against a single truth column
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss;

impl MseLoss {
    /// Create the loss
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> LossFunction<B> for MseLoss {
    fn forward(
        &self,
        prediction: Tensor<B, 2>,
        batch: &GraphBatch,
        target: &str,
        device: &B::Device,
    ) -> Result<Tensor<B, 1>> {
        let targets = batch.target_tensor::<B>(target, device)?;
        Ok(burn::nn::loss::MseLoss::new().forward(
            prediction,
            targets,
            burn::nn::loss::Reduction::Mean,
        ))
    }
}
