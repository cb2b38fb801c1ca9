use serde::{Deserialize, Serialize};

/// Non-negative weight per objective. A zero weight switches the objective
/// off entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    pub energy: f64,
    pub forces: f64,
    pub stress: f64,
}

impl LossWeights {
    pub fn new(energy: f64, forces: f64, stress: f64) -> Self {
        LossWeights { energy, forces, stress }
    }

    pub fn energy_active(&self) -> bool {
        self.energy > 0.0
    }

    pub fn forces_active(&self) -> bool {
        self.forces > 0.0
    }

    pub fn stress_active(&self) -> bool {
        self.stress > 0.0
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        LossWeights { energy: 1.0, forces: 1.0, stress: 0.0 }
    }
}

/// Loss values for one batch. Inactive objectives are `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRecord {
    pub total: f64,
    pub energy: Option<f64>,
    pub forces: Option<f64>,
    pub stress: Option<f64>,
}

/// `Σ weight * loss` over the present terms.
///
/// An infinite loss with zero weight is left out instead of turning the sum
/// into `0 * inf = NaN`. With a positive weight the infinity propagates.
pub fn compute_weighted_loss(
    weights: &LossWeights,
    energy: Option<f64>,
    forces: Option<f64>,
    stress: Option<f64>,
) -> f64 {
    [(weights.energy, energy), (weights.forces, forces), (weights.stress, stress)]
        .into_iter()
        .filter_map(|(w, loss)| loss.map(|l| (w, l)))
        .filter(|&(w, l)| !l.is_infinite() || w > 0.0)
        .map(|(w, l)| w * l)
        .sum()
}
