#![allow(dead_code)]

use equitrain::data::{AtomicGraph, GraphBatch, GraphDataset};
use equitrain::model::{Model, Outputs, Prediction, PredictionGrad};
use equitrain::Result;

/// Predicts the same energy, its only parameter, for every graph and zero
/// forces and stress.
pub struct ConstantEnergy {
    pub params: Vec<f64>,
    /// Ignore gradients, so the parameter never moves.
    pub frozen: bool,
    pub forward_calls: usize,
}

impl ConstantEnergy {
    pub fn new(value: f64) -> Self {
        ConstantEnergy { params: vec![value], frozen: false, forward_calls: 0 }
    }

    pub fn frozen(value: f64) -> Self {
        ConstantEnergy { frozen: true, ..Self::new(value) }
    }
}

impl Model for ConstantEnergy {
    fn forward(&mut self, batch: &GraphBatch, outputs: Outputs) -> Result<Prediction> {
        self.forward_calls += 1;
        Ok(Prediction {
            energy: vec![self.params[0]; batch.num_graphs()],
            forces: outputs.forces.then(|| vec![[0.0; 3]; batch.num_atoms()]),
            stress: outputs.stress.then(|| vec![[0.0; 9]; batch.num_graphs()]),
        })
    }

    fn backward(&mut self, grad: &PredictionGrad, grads: &mut [f64]) {
        if !self.frozen {
            grads[0] += grad.energy.iter().sum::<f64>();
        }
    }

    fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["energy.weight".to_string()]
    }
}

/// Chain of `n_atoms` hydrogen atoms, every neighbour pair bonded both ways.
pub fn chain(n_atoms: usize, energy: f64) -> AtomicGraph {
    let mut edge_index = Vec::new();
    for i in 1..n_atoms {
        edge_index.push([i - 1, i]);
        edge_index.push([i, i - 1]);
    }
    AtomicGraph {
        atomic_numbers: vec![1; n_atoms],
        positions: (0..n_atoms).map(|i| [i as f64, 0.0, 0.0]).collect(),
        shifts: vec![[0.0; 3]; edge_index.len()],
        edge_index,
        volume: None,
        energy,
        forces: vec![[0.0; 3]; n_atoms],
        stress: [[0.0; 3]; 3],
    }
}

pub fn dataset(graphs: Vec<AtomicGraph>) -> GraphDataset {
    GraphDataset::new(1.5, graphs)
}
