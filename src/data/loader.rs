//! Mini-batch loader
//!
//! Groups a dataset's events into fixed-size mini-batches with seeded
//! per-epoch shuffling. With `num_workers > 0`, batch construction is
//! offloaded to background threads that prefetch a bounded number of
//! batches ahead of the consumer; batch order is preserved either way, so
//! the training loop only ever observes a blocking iterator.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use rusqlite::Connection;

use crate::data::dataset::SqliteEventDataset;
use crate::data::GraphBatch;
use crate::error::{RecoError, Result};

/// Batches prefetched per worker
const PREFETCH_FACTOR: usize = 2;

/// Default shuffle seed; advanced by one per epoch
const SHUFFLE_SEED: u64 = 42;

/// Order-preserving mini-batch loader over a [`SqliteEventDataset`]
#[derive(Debug)]
pub struct DataLoader {
    dataset: SqliteEventDataset,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
    seed: u64,
    epoch: usize,
}

impl DataLoader {
    /// Create a loader over `dataset`
    pub fn new(
        dataset: SqliteEventDataset,
        batch_size: usize,
        shuffle: bool,
        num_workers: usize,
    ) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle,
            num_workers,
            seed: SHUFFLE_SEED,
            epoch: 0,
        }
    }

    /// Override the shuffle seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of batches per epoch
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Whether the loader yields no batches
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// The underlying dataset
    pub fn dataset(&self) -> &SqliteEventDataset {
        &self.dataset
    }

    /// Start one epoch's iteration. Each call reshuffles (when enabled)
    /// with a seed derived from the epoch counter.
    pub fn iter(&mut self) -> Result<BatchIter> {
        let mut events = self.dataset.events().to_vec();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.epoch as u64));
            events.shuffle(&mut rng);
        }
        self.epoch += 1;

        let chunks: Vec<Vec<i64>> = events
            .chunks(self.batch_size)
            .map(<[i64]>::to_vec)
            .collect();

        if self.num_workers == 0 {
            let conn = self.dataset.connect()?;
            return Ok(BatchIter {
                inner: BatchIterInner::Sequential {
                    dataset: self.dataset.clone(),
                    conn,
                    chunks: chunks.into_iter(),
                },
            });
        }

        let total = chunks.len();
        let chunks = Arc::new(chunks);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = sync_channel(self.num_workers * PREFETCH_FACTOR);

        for _ in 0..self.num_workers {
            let chunks = Arc::clone(&chunks);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            let dataset = self.dataset.clone();
            let _handle = thread::spawn(move || {
                let conn = dataset.connect();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= chunks.len() {
                        break;
                    }
                    let batch = match &conn {
                        Ok(conn) => dataset.load_batch(conn, &chunks[index]),
                        Err(e) => Err(RecoError::Internal(format!(
                            "worker connection failed: {e}"
                        ))),
                    };
                    // A send failure means the consumer is gone; stop quietly.
                    if tx.send((index, batch)).is_err() {
                        break;
                    }
                }
            });
        }

        Ok(BatchIter {
            inner: BatchIterInner::Workers {
                rx,
                pending: BTreeMap::new(),
                next: 0,
                total,
            },
        })
    }
}

/// Blocking iterator over one epoch's batches
pub struct BatchIter {
    inner: BatchIterInner,
}

enum BatchIterInner {
    Sequential {
        dataset: SqliteEventDataset,
        conn: Connection,
        chunks: std::vec::IntoIter<Vec<i64>>,
    },
    Workers {
        rx: Receiver<(usize, Result<GraphBatch>)>,
        pending: BTreeMap<usize, Result<GraphBatch>>,
        next: usize,
        total: usize,
    },
}

impl Iterator for BatchIter {
    type Item = Result<GraphBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            BatchIterInner::Sequential {
                dataset,
                conn,
                chunks,
            } => chunks
                .next()
                .map(|events| dataset.load_batch(conn, &events)),
            BatchIterInner::Workers {
                rx,
                pending,
                next,
                total,
            } => {
                if *next >= *total {
                    return None;
                }
                loop {
                    if let Some(batch) = pending.remove(next) {
                        *next += 1;
                        return Some(batch);
                    }
                    match rx.recv() {
                        Ok((index, batch)) => {
                            pending.insert(index, batch);
                        }
                        Err(_) => {
                            // All workers exited without producing our batch.
                            *next = *total;
                            return Some(Err(RecoError::Internal(
                                "batch worker exited unexpectedly".to_string(),
                            )));
                        }
                    }
                }
            }
        }
    }
}
