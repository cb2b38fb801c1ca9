use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::graph::GraphBatch;
use crate::data::statistics::Statistics;
use crate::error::{EquitrainError, Result};
use crate::math::vec3::{self, Vec3};
use crate::model::model::{Model, Outputs, Prediction, PredictionGrad};
use crate::model::radial::RadialBasis;

/// Architecture of a `PairPotential`, enough to rebuild it around a saved
/// parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPotentialConfig {
    pub atomic_numbers: Vec<u32>,
    pub r_max: f64,
    pub n_basis: usize,
}

/// Per-edge quantities kept from the forward pass.
struct EdgeTape {
    graph: usize,
    sender: usize,
    receiver: usize,
    pair: usize,
    values: Vec<f64>,
    derivs: Vec<f64>,
    unit: Vec3,
    /// `r_a r_b / (r V)`, zero when the graph has no cell.
    virial: [f64; 9],
}

/// Linear pair potential:
///
/// `E = Σ_i e0[z_i] + ½ Σ_(i,j) Σ_k c[z_i z_j, k] b_k(r_ij)`
///
/// over directed edges, with `b_k` the Bessel basis. Forces are `-∂E/∂r_i`
/// and stress is the virial divided by the cell volume. Every output is
/// linear in the parameters, so `backward` is exact.
pub struct PairPotential {
    config: PairPotentialConfig,
    basis: RadialBasis,
    /// Species index to pair block, symmetric.
    pair_table: Vec<Vec<usize>>,
    params: Vec<f64>,
    tape: Vec<EdgeTape>,
    atom_tape: Vec<(usize, usize)>,
}

impl PairPotential {
    /// Fresh model with atomic energies from `statistics` and small random
    /// radial coefficients.
    pub fn new(statistics: &Statistics, n_basis: usize, seed: u64) -> Self {
        let config = PairPotentialConfig {
            atomic_numbers: statistics.atomic_numbers.clone(),
            r_max: statistics.r_max,
            n_basis,
        };
        let mut model = Self::from_config(config);

        let species = statistics.atomic_energies.len();
        model.params[..species].copy_from_slice(&statistics.atomic_energies);

        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 0.1 / (n_basis.max(1) as f64).sqrt();
        for c in &mut model.params[species..] {
            *c = rng.gen_range(-scale..scale);
        }
        model
    }

    /// Model with every parameter at zero.
    pub fn from_config(config: PairPotentialConfig) -> Self {
        let s = config.atomic_numbers.len();
        let mut pair_table = vec![vec![0; s]; s];
        let mut next = 0;
        for a in 0..s {
            for b in a..s {
                pair_table[a][b] = next;
                pair_table[b][a] = next;
                next += 1;
            }
        }
        let n_params = s + next * config.n_basis;

        PairPotential {
            basis: RadialBasis::new(config.r_max, config.n_basis),
            config,
            pair_table,
            params: vec![0.0; n_params],
            tape: Vec::new(),
            atom_tape: Vec::new(),
        }
    }

    pub fn config(&self) -> &PairPotentialConfig {
        &self.config
    }

    fn num_species(&self) -> usize {
        self.config.atomic_numbers.len()
    }

    fn species(&self, z: u32) -> Result<usize> {
        self.config
            .atomic_numbers
            .iter()
            .position(|&x| x == z)
            .ok_or(EquitrainError::UnknownSpecies(z))
    }

    fn coefficients(&self, pair: usize) -> &[f64] {
        let start = self.num_species() + pair * self.config.n_basis;
        &self.params[start..start + self.config.n_basis]
    }
}

impl Model for PairPotential {
    fn forward(&mut self, batch: &GraphBatch, outputs: Outputs) -> Result<Prediction> {
        let n_graphs = batch.num_graphs();
        let mut energy = vec![0.0; n_graphs];
        let mut forces = vec![[0.0; 3]; batch.num_atoms()];
        let mut stress = vec![[0.0; 9]; n_graphs];

        self.atom_tape.clear();
        for (&z, &g) in batch.atomic_numbers.iter().zip(&batch.batch) {
            let s = self.species(z)?;
            energy[g] += self.params[s];
            self.atom_tape.push((g, s));
        }

        let mut tape = Vec::with_capacity(batch.num_edges());
        for (&[i, j], &shift) in batch.edge_index.iter().zip(&batch.shifts) {
            let r_vec = vec3::sub(vec3::add(batch.positions[j], shift), batch.positions[i]);
            let r = vec3::norm(r_vec);
            if r <= 0.0 || r >= self.config.r_max {
                continue;
            }
            let pair = self.pair_table[self.species(batch.atomic_numbers[i])?]
                [self.species(batch.atomic_numbers[j])?];
            let graph = batch.batch[i];
            let (values, derivs) = self.basis.evaluate(r);
            let coeffs = self.coefficients(pair);

            let e: f64 = coeffs.iter().zip(&values).map(|(c, v)| c * v).sum();
            let de: f64 = coeffs.iter().zip(&derivs).map(|(c, d)| c * d).sum();
            energy[graph] += 0.5 * e;

            let unit = vec3::scale(r_vec, 1.0 / r);
            let push = vec3::scale(unit, 0.5 * de);
            forces[i] = vec3::add(forces[i], push);
            forces[j] = vec3::sub(forces[j], push);

            let mut virial = [0.0; 9];
            if let Some(volume) = batch.volume[graph] {
                for a in 0..3 {
                    for b in 0..3 {
                        virial[3 * a + b] = r_vec[a] * unit[b] / volume;
                    }
                }
            }
            for (s, v) in stress[graph].iter_mut().zip(&virial) {
                *s += 0.5 * de * v;
            }

            tape.push(EdgeTape { graph, sender: i, receiver: j, pair, values, derivs, unit, virial });
        }
        self.tape = tape;

        Ok(Prediction {
            energy,
            forces: outputs.forces.then_some(forces),
            stress: outputs.stress.then_some(stress),
        })
    }

    fn backward(&mut self, grad: &PredictionGrad, grads: &mut [f64]) {
        for &(g, s) in &self.atom_tape {
            grads[s] += grad.energy[g];
        }

        let species = self.num_species();
        let n_basis = self.config.n_basis;
        for edge in &self.tape {
            let g_energy = grad.energy[edge.graph];
            let g_forces = grad.forces.as_ref().map_or(0.0, |f| {
                vec3::dot(f[edge.sender], edge.unit) - vec3::dot(f[edge.receiver], edge.unit)
            });
            let g_stress = grad.stress.as_ref().map_or(0.0, |s| {
                s[edge.graph].iter().zip(&edge.virial).map(|(a, b)| a * b).sum()
            });

            let start = species + edge.pair * n_basis;
            for k in 0..n_basis {
                grads[start + k] +=
                    0.5 * (edge.values[k] * g_energy + edge.derivs[k] * (g_forces + g_stress));
            }
        }
    }

    fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    fn parameter_names(&self) -> Vec<String> {
        let zs = &self.config.atomic_numbers;
        let mut names: Vec<String> = zs.iter().map(|z| format!("atomic_energies.bias.{z}")).collect();
        for a in 0..zs.len() {
            for b in a..zs.len() {
                for k in 0..self.config.n_basis {
                    names.push(format!("radial.weight.{}-{}.{k}", zs[a], zs[b]));
                }
            }
        }
        names
    }
}
