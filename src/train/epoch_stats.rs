use serde::{Deserialize, Serialize};

/// Per-epoch summary emitted by `TrainSession::run`.
///
/// One value per epoch is appended to the run history and, when a
/// `progress_tx` channel is configured, sent to it as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index, as used in log lines and checkpoint names.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean training loss over the batches that were not skipped.
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_energy_loss: Option<f64>,
    pub val_forces_loss: Option<f64>,
    pub val_stress_loss: Option<f64>,
    /// Batches dropped by the edge limit.
    pub skipped_batches: usize,
    /// Learning rate in effect during this epoch.
    pub lr: f64,
    pub improved: bool,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
