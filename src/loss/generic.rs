use crate::data::graph::GraphBatch;
use crate::error::{EquitrainError, Result};
use crate::loss::loss_type::LossType;
use crate::loss::weighted::{compute_weighted_loss, LossRecord, LossWeights};
use crate::model::model::{Outputs, Prediction, PredictionGrad};

/// Weighted energy / forces / stress regression loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericLoss {
    pub weights: LossWeights,
    pub loss_type: LossType,
    /// Compare energies divided by the number of atoms in each graph.
    pub energy_per_atom: bool,
}

impl GenericLoss {
    pub fn new(weights: LossWeights) -> Self {
        GenericLoss { weights, loss_type: LossType::Mae, energy_per_atom: false }
    }

    pub fn with_loss_type(mut self, loss_type: LossType) -> Self {
        self.loss_type = loss_type;
        self
    }

    pub fn with_energy_per_atom(mut self, per_atom: bool) -> Self {
        self.energy_per_atom = per_atom;
        self
    }

    /// Derived quantities the model has to produce for this loss.
    pub fn outputs(&self) -> Outputs {
        Outputs {
            forces: self.weights.forces_active(),
            stress: self.weights.stress_active(),
        }
    }

    /// Evaluates every active objective. Inactive ones are `None` and are
    /// not computed.
    pub fn compute(&self, pred: &Prediction, batch: &GraphBatch) -> Result<LossRecord> {
        let energy = if self.weights.energy_active() {
            let (p, y) = self.energies(pred, batch);
            Some(self.loss_type.loss(&p, &y))
        } else {
            None
        };

        let forces = if self.weights.forces_active() {
            let p = pred.forces.as_ref().ok_or(EquitrainError::MissingPrediction("forces"))?;
            Some(self.loss_type.loss(p.as_flattened(), batch.forces.as_flattened()))
        } else {
            None
        };

        let stress = if self.weights.stress_active() {
            let p = pred.stress.as_ref().ok_or(EquitrainError::MissingPrediction("stress"))?;
            Some(self.loss_type.loss(p.as_flattened(), batch.stress.as_flattened()))
        } else {
            None
        };

        Ok(LossRecord {
            total: compute_weighted_loss(&self.weights, energy, forces, stress),
            energy,
            forces,
            stress,
        })
    }

    /// Gradient of the weighted total w.r.t. the prediction.
    pub fn gradient(&self, pred: &Prediction, batch: &GraphBatch) -> Result<PredictionGrad> {
        let mut grad = PredictionGrad {
            energy: vec![0.0; pred.energy.len()],
            forces: None,
            stress: None,
        };

        if self.weights.energy_active() {
            let (p, y) = self.energies(pred, batch);
            let d = self.loss_type.derivative(&p, &y);
            for (g, (dv, &n)) in grad.energy.iter_mut().zip(d.iter().zip(&batch.atoms_per_graph)) {
                let scale = if self.energy_per_atom { 1.0 / n.max(1) as f64 } else { 1.0 };
                *g = self.weights.energy * dv * scale;
            }
        }

        if self.weights.forces_active() {
            let p = pred.forces.as_ref().ok_or(EquitrainError::MissingPrediction("forces"))?;
            let d = self.loss_type.derivative(p.as_flattened(), batch.forces.as_flattened());
            grad.forces = Some(
                d.chunks_exact(3)
                    .map(|c| [c[0] * self.weights.forces, c[1] * self.weights.forces, c[2] * self.weights.forces])
                    .collect(),
            );
        }

        if self.weights.stress_active() {
            let p = pred.stress.as_ref().ok_or(EquitrainError::MissingPrediction("stress"))?;
            let d = self.loss_type.derivative(p.as_flattened(), batch.stress.as_flattened());
            grad.stress = Some(
                d.chunks_exact(9)
                    .map(|c| {
                        let mut row = [0.0; 9];
                        for (r, v) in row.iter_mut().zip(c) {
                            *r = v * self.weights.stress;
                        }
                        row
                    })
                    .collect(),
            );
        }

        Ok(grad)
    }

    fn energies(&self, pred: &Prediction, batch: &GraphBatch) -> (Vec<f64>, Vec<f64>) {
        if !self.energy_per_atom {
            return (pred.energy.clone(), batch.energy.clone());
        }
        let per_atom = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .zip(&batch.atoms_per_graph)
                .map(|(e, &n)| e / n.max(1) as f64)
                .collect()
        };
        (per_atom(&pred.energy), per_atom(&batch.energy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> GraphBatch {
        GraphBatch {
            atomic_numbers: vec![1, 1, 1],
            positions: vec![[0.0; 3]; 3],
            batch: vec![0, 0, 1],
            edge_index: vec![],
            shifts: vec![],
            volume: vec![None, None],
            energy: vec![-2.0, -1.0],
            forces: vec![[0.0; 3]; 3],
            stress: vec![[0.0; 9]; 2],
            atoms_per_graph: vec![2, 1],
        }
    }

    fn prediction() -> Prediction {
        Prediction {
            energy: vec![-1.0, -1.5],
            forces: Some(vec![[0.3, 0.0, 0.0]; 3]),
            stress: None,
        }
    }

    #[test]
    fn inactive_objectives_are_absent() {
        let loss = GenericLoss::new(LossWeights::new(1.0, 0.0, 0.0));
        let record = loss.compute(&prediction(), &batch()).unwrap();
        assert_eq!(record.energy, Some(0.75));
        assert_eq!(record.forces, None);
        assert_eq!(record.stress, None);
        assert_eq!(record.total, 0.75);
        assert_eq!(loss.outputs(), Outputs::default());
    }

    #[test]
    fn weighted_total_combines_active_terms() {
        let loss = GenericLoss::new(LossWeights::new(1.0, 2.0, 0.0));
        let record = loss.compute(&prediction(), &batch()).unwrap();
        // forces: three of nine components are 0.3 off.
        assert!((record.forces.unwrap() - 0.1).abs() < 1e-12);
        assert!((record.total - (0.75 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn missing_stress_prediction_is_an_error() {
        let loss = GenericLoss::new(LossWeights::new(1.0, 1.0, 1.0));
        assert!(matches!(
            loss.compute(&prediction(), &batch()),
            Err(EquitrainError::MissingPrediction("stress"))
        ));
    }

    #[test]
    fn per_atom_energy_scales_loss_and_gradient() {
        let loss = GenericLoss::new(LossWeights::new(2.0, 0.0, 0.0)).with_energy_per_atom(true);
        let record = loss.compute(&prediction(), &batch()).unwrap();
        // |-0.5 - -1.0| and |-1.5 - -1.0| averaged.
        assert!((record.energy.unwrap() - 0.5).abs() < 1e-12);

        let grad = loss.gradient(&prediction(), &batch()).unwrap();
        assert_eq!(grad.energy, vec![2.0 * 0.5 * 0.5, 2.0 * -0.5 * 1.0]);
        assert!(grad.forces.is_none());
    }

    #[test]
    fn gradient_matches_finite_difference_of_total() {
        let loss = GenericLoss::new(LossWeights::new(1.0, 3.0, 0.0)).with_loss_type(LossType::Mse);
        let b = batch();
        let p = prediction();
        let grad = loss.gradient(&p, &b).unwrap();

        let h = 1e-6;
        let mut up = p.clone();
        up.forces.as_mut().unwrap()[1][0] += h;
        let mut down = p.clone();
        down.forces.as_mut().unwrap()[1][0] -= h;
        let numeric = (loss.compute(&up, &b).unwrap().total - loss.compute(&down, &b).unwrap().total) / (2.0 * h);
        assert!((numeric - grad.forces.unwrap()[1][0]).abs() < 1e-6);
    }
}
