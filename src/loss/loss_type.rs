use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::EquitrainError;

/// Huber transition point between the quadratic and linear regimes.
const HUBER_DELTA: f64 = 1.0;

/// Selects the per-objective regression loss.
///
/// - `Mae`: mean absolute error (L1); the default for energy, forces and stress.
/// - `Mse`: mean squared error.
/// - `Huber`: Huber loss (δ=1.0), quadratic near zero and linear in the tails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Mae,
    Mse,
    Huber,
}

impl LossType {
    /// Mean of the per-residual loss over every component. Zero for empty
    /// input.
    pub fn loss(self, predicted: &[f64], expected: &[f64]) -> f64 {
        if predicted.is_empty() {
            return 0.0;
        }
        let n = predicted.len() as f64;
        predicted
            .iter()
            .zip(expected)
            .map(|(p, y)| self.residual_loss(p - y))
            .sum::<f64>()
            / n
    }

    /// Gradient of `loss` w.r.t. each predicted component.
    pub fn derivative(self, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted
            .iter()
            .zip(expected)
            .map(|(p, y)| self.residual_grad(p - y) / n)
            .collect()
    }

    fn residual_loss(self, x: f64) -> f64 {
        match self {
            LossType::Mae => x.abs(),
            LossType::Mse => x * x,
            LossType::Huber if x.abs() <= HUBER_DELTA => 0.5 * x * x,
            LossType::Huber => HUBER_DELTA * (x.abs() - 0.5 * HUBER_DELTA),
        }
    }

    fn residual_grad(self, x: f64) -> f64 {
        match self {
            // Subgradient 0 at an exact match.
            LossType::Mae if x == 0.0 => 0.0,
            LossType::Mae => x.signum(),
            LossType::Mse => 2.0 * x,
            LossType::Huber if x.abs() <= HUBER_DELTA => x,
            LossType::Huber => HUBER_DELTA * x.signum(),
        }
    }
}

impl FromStr for LossType {
    type Err = EquitrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mae" | "l1"    => Ok(LossType::Mae),
            "mse" | "l2"    => Ok(LossType::Mse),
            "huber"         => Ok(LossType::Huber),
            other           => Err(EquitrainError::UnknownLoss(other.to_string())),
        }
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LossType::Mae   => "mae",
            LossType::Mse   => "mse",
            LossType::Huber => "huber",
        };
        f.write_str(name)
    }
}
