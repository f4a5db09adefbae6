//! Shared fixtures for the integration tests: scratch event databases and
//! a minimal graph network.
#![allow(dead_code)]

use std::path::PathBuf;

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use rusqlite::Connection;

use reco::{DataConfig, GraphBatch, GraphNetwork};

/// Create a scratch database with `pulses(event_no, dom_x, charge)` and
/// `truth(event_no, energy)`; two pulses per event.
pub fn scratch_database(dir: &std::path::Path, name: &str, events: &[i64]) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "CREATE TABLE pulses (event_no INTEGER, dom_x REAL, charge REAL)",
        [],
    )
    .unwrap();
    conn.execute("CREATE TABLE truth (event_no INTEGER, energy REAL)", [])
        .unwrap();

    for &event_no in events {
        for node in 0..2 {
            conn.execute(
                "INSERT INTO pulses (event_no, dom_x, charge) VALUES (?1, ?2, ?3)",
                rusqlite::params![event_no, (event_no % 7) as f64 + node as f64, 1.0],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO truth (event_no, energy) VALUES (?1, ?2)",
            rusqlite::params![event_no, (event_no % 5) as f64],
        )
        .unwrap();
    }
    path
}

/// Data configuration matching the scratch databases
pub fn data_config(batch_size: usize, num_workers: usize) -> DataConfig {
    DataConfig {
        pulsemap: "pulses".to_string(),
        features: vec!["dom_x".to_string(), "charge".to_string()],
        truth: vec!["energy".to_string()],
        batch_size,
        num_workers,
    }
}

/// Smallest possible graph network: mean-pool the nodes, one linear layer.
#[derive(Module, Debug)]
pub struct TinyNet<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> TinyNet<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(2, 1).init(device),
        }
    }

    /// Flattened copy of the linear weights, for snapshot comparisons
    pub fn weights(&self) -> Vec<f32> {
        self.linear
            .weight
            .val()
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }
}

impl<B: Backend> GraphNetwork<B> for TinyNet<B> {
    fn forward(&self, batch: &GraphBatch, device: &B::Device) -> Tensor<B, 2> {
        self.linear.forward(batch.mean_node_features(device))
    }
}
