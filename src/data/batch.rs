//! Mini-batch of event graphs
//!
//! A [`GraphBatch`] keeps its payload as plain rows; tensors are only
//! materialized on a chosen device when a consumer asks for them, which is
//! the "move to device" step of the training loop.

use std::collections::HashMap;

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::data::dataset::EventGraph;
use crate::error::{RecoError, Result};

/// A mini-batch of graph-structured event records
#[derive(Debug, Clone)]
pub struct GraphBatch {
    /// Flattened node features, row-major `[total_nodes, n_features]`
    node_features: Vec<f32>,
    /// Number of feature columns per node
    n_features: usize,
    /// Nodes per graph, in batch order
    node_counts: Vec<usize>,
    /// Per-event truth fields, one value per graph
    truth: HashMap<String, Vec<f32>>,
    /// Event identifiers, one per graph
    event_nos: Vec<i64>,
}

impl GraphBatch {
    /// Collate individual event graphs into one batch
    pub fn from_graphs(graphs: Vec<EventGraph>, n_features: usize) -> Self {
        let mut node_features = Vec::new();
        let mut node_counts = Vec::with_capacity(graphs.len());
        let mut truth: HashMap<String, Vec<f32>> = HashMap::new();
        let mut event_nos = Vec::with_capacity(graphs.len());

        for graph in graphs {
            node_counts.push(graph.n_nodes);
            node_features.extend_from_slice(&graph.node_features);
            event_nos.push(graph.event_no);
            for (name, value) in graph.truth {
                truth.entry(name).or_default().push(value);
            }
        }

        Self {
            node_features,
            n_features,
            node_counts,
            truth,
            event_nos,
        }
    }

    /// Number of graphs in the batch
    pub fn len(&self) -> usize {
        self.node_counts.len()
    }

    /// Whether the batch holds no graphs
    pub fn is_empty(&self) -> bool {
        self.node_counts.is_empty()
    }

    /// Total node count across all graphs
    pub fn total_nodes(&self) -> usize {
        self.node_counts.iter().sum()
    }

    /// Feature columns per node
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Nodes per graph, in batch order
    pub fn node_counts(&self) -> &[usize] {
        &self.node_counts
    }

    /// Event identifiers, one per graph
    pub fn event_nos(&self) -> &[i64] {
        &self.event_nos
    }

    /// Raw flattened node features
    pub fn node_features(&self) -> &[f32] {
        &self.node_features
    }

    /// Per-event truth field by name, one value per graph
    pub fn field(&self, name: &str) -> Option<&[f32]> {
        self.truth.get(name).map(Vec::as_slice)
    }

    /// All node features as a `[total_nodes, n_features]` tensor
    pub fn node_feature_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let data = TensorData::new(
            self.node_features.clone(),
            [self.total_nodes(), self.n_features],
        );
        Tensor::from_data(data, device)
    }

    /// Per-graph mean-pooled node features as a `[len, n_features]` tensor.
    ///
    /// Graphs without any nodes contribute a zero row.
    pub fn mean_node_features<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let mut pooled = vec![0.0f32; self.len() * self.n_features];
        let mut offset = 0;
        for (graph, &count) in self.node_counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let row = &mut pooled[graph * self.n_features..(graph + 1) * self.n_features];
            for node in 0..count {
                let start = (offset + node) * self.n_features;
                for (feature, value) in row.iter_mut().zip(&self.node_features[start..]) {
                    *feature += value;
                }
            }
            for feature in row.iter_mut() {
                *feature /= count as f32;
            }
            offset += count;
        }

        let data = TensorData::new(pooled, [self.len(), self.n_features]);
        Tensor::from_data(data, device)
    }

    /// The named truth field as a `[len, 1]` tensor
    pub fn target_tensor<B: Backend>(&self, name: &str, device: &B::Device) -> Result<Tensor<B, 2>> {
        let values = self
            .field(name)
            .ok_or_else(|| RecoError::MissingField(name.to_string()))?;
        let data = TensorData::new(values.to_vec(), [values.len(), 1]);
        Ok(Tensor::from_data(data, device))
    }
}
