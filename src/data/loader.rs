use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::GraphDataset;
use crate::data::graph::{collate, AtomicGraph, GraphBatch};

/// Splits a dataset into batches, optionally shuffled, optionally prepared
/// on a background thread.
///
/// Shuffling is seeded with `seed + pass`, where `pass` counts calls to
/// `iter`, so a run is reproducible while each epoch sees a new order.
pub struct DataLoader {
    graphs: Arc<Vec<AtomicGraph>>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    workers: usize,
    pass: u64,
}

impl DataLoader {
    /// # Panics
    /// Panics if `batch_size == 0`.
    pub fn new(dataset: GraphDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        DataLoader {
            graphs: Arc::new(dataset.graphs),
            batch_size,
            shuffle: false,
            seed: 0,
            workers: 0,
            pass: 0,
        }
    }

    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Number of batches kept ready ahead of the consumer. `0` collates
    /// inline.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Number of batches per pass (the last one may be short).
    pub fn len(&self) -> usize {
        self.graphs.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn num_graphs(&self) -> usize {
        self.graphs.len()
    }

    /// Starts a new pass over the data.
    pub fn iter(&mut self) -> Batches {
        let mut order: Vec<usize> = (0..self.graphs.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.pass));
            order.shuffle(&mut rng);
        }
        self.pass += 1;

        if self.workers == 0 {
            return Batches::Inline {
                graphs: Arc::clone(&self.graphs),
                order,
                batch_size: self.batch_size,
                next: 0,
            };
        }

        let (tx, rx) = mpsc::sync_channel(self.workers);
        let graphs = Arc::clone(&self.graphs);
        let batch_size = self.batch_size;
        let handle = thread::spawn(move || {
            for chunk in order.chunks(batch_size) {
                let batch = collate(chunk.iter().map(|&i| &graphs[i]));
                // Receiver dropped: the consumer stopped early.
                if tx.send(batch).is_err() {
                    break;
                }
            }
        });

        Batches::Prefetch { rx, handle: Some(handle) }
    }
}

/// One pass worth of batches.
pub enum Batches {
    Inline {
        graphs: Arc<Vec<AtomicGraph>>,
        order: Vec<usize>,
        batch_size: usize,
        next: usize,
    },
    Prefetch {
        rx: Receiver<GraphBatch>,
        handle: Option<JoinHandle<()>>,
    },
}

impl Iterator for Batches {
    type Item = GraphBatch;

    fn next(&mut self) -> Option<GraphBatch> {
        match self {
            Batches::Inline { graphs, order, batch_size, next } => {
                if *next >= order.len() {
                    return None;
                }
                let end = (*next + *batch_size).min(order.len());
                let batch = collate(order[*next..end].iter().map(|&i| &graphs[i]));
                *next = end;
                Some(batch)
            }
            Batches::Prefetch { rx, handle } => match rx.recv() {
                Ok(batch) => Some(batch),
                Err(_) => {
                    if let Some(h) = handle.take() {
                        // The producer only ends by finishing or by a panic in collate.
                        if h.join().is_err() {
                            tracing::error!("data loading thread panicked");
                        }
                    }
                    None
                }
            },
        }
    }
}
