use serde::{Deserialize, Serialize};

/// Lowest validation loss seen so far in a run, with the per-objective
/// averages and the epoch it was reached at.
///
/// Objective fields stay `None` until an improvement is recorded and are
/// never set for inactive objectives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestMetrics {
    pub loss: f64,
    pub energy_loss: Option<f64>,
    pub forces_loss: Option<f64>,
    pub stress_loss: Option<f64>,
    pub epoch: usize,
}

impl Default for BestMetrics {
    fn default() -> Self {
        BestMetrics {
            loss: f64::INFINITY,
            energy_loss: None,
            forces_loss: None,
            stress_loss: None,
            epoch: 0,
        }
    }
}

/// Candidate averages from one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub loss: f64,
    pub energy_loss: Option<f64>,
    pub forces_loss: Option<f64>,
    pub stress_loss: Option<f64>,
}

impl BestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `candidate` if its total is strictly below the current best.
    /// Returns whether anything changed.
    pub fn update(&mut self, candidate: Candidate, epoch: usize) -> bool {
        if !(candidate.loss < self.loss) {
            return false;
        }

        self.loss = candidate.loss;
        if candidate.energy_loss.is_some() {
            self.energy_loss = candidate.energy_loss;
        }
        if candidate.forces_loss.is_some() {
            self.forces_loss = candidate.forces_loss;
        }
        if candidate.stress_loss.is_some() {
            self.stress_loss = candidate.stress_loss;
        }
        self.epoch = epoch;
        true
    }
}
