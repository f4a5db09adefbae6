//! Run Archiving
//!
//! Persists one run's outputs under `<root>/<database>/<tag>/`: the
//! results table as CSV and the trained model as a named-message-pack
//! record.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use tracing::{info, warn};

use crate::error::{RecoError, Result};
use crate::training::predictor::PredictionTable;

/// Archive of training runs, one directory per (database, run-tag)
pub struct RunArchive {
    root: PathBuf,
}

impl RunArchive {
    /// Create an archive rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            if let Err(e) = fs::create_dir_all(&root) {
                warn!("Failed to create archive directory: {}", e);
            }
        }

        Self { root }
    }

    /// Archive root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one run: `<root>/<database stem>/<tag>`
    pub fn run_dir(&self, database: &Path, tag: &str) -> PathBuf {
        let stem = database
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.root.join(stem).join(tag)
    }

    /// Save a run's results table and model artifact.
    ///
    /// Returns the run directory. Writes `results.csv` and `<tag>.mpk`.
    pub fn save_results<B, M>(
        &self,
        database: &Path,
        tag: &str,
        results: &PredictionTable,
        model: &M,
    ) -> Result<PathBuf>
    where
        B: Backend,
        M: Module<B>,
    {
        let dir = self.run_dir(database, tag);
        fs::create_dir_all(&dir)?;

        results.to_csv(&dir.join("results.csv"))?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(dir.join(tag), &recorder)
            .map_err(|e| RecoError::Internal(format!("failed to save model artifact: {e}")))?;

        info!(path = %dir.display(), "results saved");
        Ok(dir)
    }
}

/// Generate a run tag with a timestamp
pub fn timestamped_tag(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"))
}
