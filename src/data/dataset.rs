//! SQLite event dataset
//!
//! One graph per event: node features come from the configured pulsemap
//! table, truth fields from the `truth` table. The dataset itself holds
//! only the database path, column configuration and event selection;
//! every consumer opens its own connection, which is what lets batch
//! construction move to background workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::config::DataConfig;
use crate::data::database::read_event_selection;
use crate::data::scaler::RobustScaler;
use crate::data::GraphBatch;
use crate::error::Result;

/// A single event as a graph: one node per pulse
#[derive(Debug, Clone)]
pub struct EventGraph {
    /// Event identifier
    pub event_no: i64,
    /// Flattened node features, row-major `[n_nodes, n_features]`
    pub node_features: Vec<f32>,
    /// Number of nodes (pulses)
    pub n_nodes: usize,
    /// Per-event truth fields
    pub truth: Vec<(String, f32)>,
}

/// Event dataset backed by a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteEventDataset {
    database: PathBuf,
    features: Vec<String>,
    truth: Vec<String>,
    events: Vec<i64>,
    scaler: Option<Arc<RobustScaler>>,
    pulse_query: String,
    truth_query: String,
}

impl SqliteEventDataset {
    /// Create a dataset over `selection`, or over the whole database when
    /// no selection is given.
    pub fn new(
        database: impl Into<PathBuf>,
        config: &DataConfig,
        selection: Option<Vec<i64>>,
    ) -> Result<Self> {
        let database = database.into();
        let events = match selection {
            Some(events) => events,
            None => read_event_selection(&database)?,
        };

        let pulse_query = format!(
            "SELECT {} FROM {} WHERE event_no = ?1",
            config.features.join(", "),
            config.pulsemap,
        );
        let truth_query = format!(
            "SELECT {} FROM truth WHERE event_no = ?1",
            config.truth.join(", "),
        );

        Ok(Self {
            database,
            features: config.features.clone(),
            truth: config.truth.clone(),
            events,
            scaler: None,
            pulse_query,
            truth_query,
        })
    }

    /// Attach a fitted feature scaler, applied to every loaded event
    pub fn with_scaler(mut self, scaler: Arc<RobustScaler>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Open a fresh connection to the backing database
    pub fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.database)?)
    }

    /// Number of events in the selection
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the selection is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event selection
    pub fn events(&self) -> &[i64] {
        &self.events
    }

    /// Path of the backing database
    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Feature columns per node
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Load a single event as a graph
    pub fn load_event(&self, conn: &Connection, event_no: i64) -> Result<EventGraph> {
        let mut stmt = conn.prepare_cached(&self.pulse_query)?;
        let mut rows = stmt.query([event_no])?;

        let mut node_features = Vec::new();
        let mut n_nodes = 0;
        while let Some(row) = rows.next()? {
            for column in 0..self.features.len() {
                node_features.push(row.get::<_, f64>(column)? as f32);
            }
            n_nodes += 1;
        }

        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut node_features, self.features.len());
        }

        let mut stmt = conn.prepare_cached(&self.truth_query)?;
        let truth = stmt.query_row([event_no], |row| {
            let mut truth = Vec::with_capacity(self.truth.len());
            for (column, name) in self.truth.iter().enumerate() {
                truth.push((name.clone(), row.get::<_, f64>(column)? as f32));
            }
            Ok(truth)
        })?;

        Ok(EventGraph {
            event_no,
            node_features,
            n_nodes,
            truth,
        })
    }

    /// Load a batch of events and collate them
    pub fn load_batch(&self, conn: &Connection, events: &[i64]) -> Result<GraphBatch> {
        let graphs = events
            .iter()
            .map(|&event_no| self.load_event(conn, event_no))
            .collect::<Result<Vec<_>>>()?;
        Ok(GraphBatch::from_graphs(graphs, self.features.len()))
    }
}
