use std::sync::mpsc;

use crate::train::epoch_stats::EpochStats;

/// Loop settings for a `TrainSession`. Objective weights live on the
/// session's `GenericLoss`.
///
/// # Fields
/// - `epochs`          : number of passes over the training data
/// - `print_freq`      : log a progress line every this many steps
/// - `batch_edge_limit`: skip training batches with more edges; `0` disables
/// - `main_process`    : only the main process logs and writes checkpoints
/// - `progress_tx`     : optional channel receiving one `EpochStats` per
///                        epoch. A dropped receiver is ignored.
pub struct TrainConfig {
    pub epochs: usize,
    pub print_freq: usize,
    pub batch_edge_limit: usize,
    pub main_process: bool,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl TrainConfig {
    /// Single-process config with no edge limit and no progress channel.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            print_freq: 100,
            batch_edge_limit: 0,
            main_process: true,
            progress_tx: None,
        }
    }
}
