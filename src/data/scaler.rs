//! Robust feature scaling
//!
//! Median/IQR scaling of the per-pulse feature columns, fitted once per
//! database and persisted as JSON under the archive's `meta/` directory so
//! later runs (and prediction) reuse the same transform.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RecoError, Result};

/// Per-column robust scaler: `(x - median) / IQR`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustScaler {
    columns: Vec<String>,
    centers: Vec<f64>,
    scales: Vec<f64>,
}

impl RobustScaler {
    /// Fit a scaler from rows of feature values.
    ///
    /// Each row must carry one value per column. Columns with zero spread
    /// get a unit scale so the transform stays finite.
    pub fn fit(columns: &[String], rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(RecoError::Config(
                "cannot fit a scaler on zero feature rows".to_string(),
            ));
        }

        let mut centers = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for column in 0..columns.len() {
            let mut values: Vec<f64> = rows.iter().map(|row| row[column]).collect();
            values.sort_by(f64::total_cmp);

            let median = percentile(&values, 0.5);
            let iqr = percentile(&values, 0.75) - percentile(&values, 0.25);
            centers.push(median);
            scales.push(if iqr > 0.0 { iqr } else { 1.0 });
        }

        Ok(Self {
            columns: columns.to_vec(),
            centers,
            scales,
        })
    }

    /// Fit a scaler from the feature rows of the sampled events
    pub fn fit_from_database(
        database: &Path,
        pulsemap: &str,
        features: &[String],
        sample: &[i64],
    ) -> Result<Self> {
        let conn = Connection::open(database)?;
        let ids = sample
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {} FROM {} WHERE event_no IN ({})",
            features.join(", "),
            pulsemap,
            ids,
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(features.len());
                for column in 0..features.len() {
                    values.push(row.get::<_, f64>(column)?);
                }
                Ok(values)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            database = %database.display(),
            pulsemap,
            rows = rows.len(),
            "fitted feature scaler"
        );
        Self::fit(features, &rows)
    }

    /// Scale flattened `[n_nodes, n_features]` feature rows in place
    pub fn transform(&self, flat: &mut [f32], n_features: usize) {
        for row in flat.chunks_mut(n_features) {
            for (value, (center, scale)) in
                row.iter_mut().zip(self.centers.iter().zip(&self.scales))
            {
                *value = ((f64::from(*value) - center) / scale) as f32;
            }
        }
    }

    /// Columns this scaler was fitted on
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Canonical scaler location under an archive root
    pub fn meta_path(archive_root: &Path) -> PathBuf {
        archive_root.join("meta").join("transformers.json")
    }

    /// Persist as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        info!(path = %path.display(), "saved feature scaler");
        Ok(())
    }

    /// Load a previously persisted scaler
    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Linear-interpolation percentile of sorted values
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}
