use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::graph::AtomicGraph;
use crate::data::loader::DataLoader;
use crate::data::structure::Structure;
use crate::error::{EquitrainError, Result};
use crate::math::matrix::Matrix;
use crate::report::Reporter;
use crate::train::meter::AverageMeter;

/// Dataset-level constants the model is built from, stored next to the
/// preprocessed graphs as `statistics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Sorted species present in the training data.
    pub atomic_numbers: Vec<u32>,
    /// Isolated-atom reference energy per species, same order.
    pub atomic_energies: Vec<f64>,
    pub r_max: f64,
    pub avg_num_neighbors: f64,
    /// Mean interaction energy per atom after removing atomic energies.
    pub mean: f64,
    /// Root mean square of the force components.
    pub std: f64,
}

impl Statistics {
    /// Position of `z` in the species table.
    pub fn species_index(&self, z: u32) -> Result<usize> {
        self.atomic_numbers
            .iter()
            .position(|&x| x == z)
            .ok_or(EquitrainError::UnknownSpecies(z))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| EquitrainError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| EquitrainError::json(path, e))
    }

    pub fn load_json(path: &Path) -> Result<Statistics> {
        let file = File::open(path).map_err(|e| EquitrainError::io(path, e))?;
        let stats: Statistics = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EquitrainError::json(path, e))?;
        if stats.atomic_numbers.len() != stats.atomic_energies.len() {
            return Err(EquitrainError::Dataset(format!(
                "{}: {} atomic numbers but {} atomic energies",
                path.display(),
                stats.atomic_numbers.len(),
                stats.atomic_energies.len()
            )));
        }
        Ok(stats)
    }

    /// Computes statistics over the training structures and their graphs.
    ///
    /// `atomic_energies = None` fits them by least squares on composition.
    pub fn compute(
        structures: &[Structure],
        graphs: &[AtomicGraph],
        r_max: f64,
        atomic_numbers: Option<Vec<u32>>,
        atomic_energies: Option<Vec<f64>>,
    ) -> Result<Statistics> {
        let zs = match atomic_numbers {
            Some(mut zs) => {
                zs.sort_unstable();
                zs.dedup();
                zs
            }
            None => structures
                .iter()
                .flat_map(|s| s.atomic_numbers.iter().copied())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let e0 = match atomic_energies {
            Some(e0) if e0.len() == zs.len() => e0,
            Some(e0) => {
                return Err(EquitrainError::InvalidArgument {
                    name: "atomic-energies",
                    reason: format!("{} values for {} species", e0.len(), zs.len()),
                })
            }
            None => fit_atomic_energies(structures, &zs)?,
        };

        let mut stats = Statistics {
            atomic_numbers: zs,
            atomic_energies: e0,
            r_max,
            avg_num_neighbors: 0.0,
            mean: 0.0,
            std: 1.0,
        };

        let atoms: usize = graphs.iter().map(|g| g.num_atoms()).sum();
        let edges: usize = graphs.iter().map(|g| g.num_edges()).sum();
        if atoms > 0 {
            stats.avg_num_neighbors = edges as f64 / atoms as f64;
        }

        let mut mean = AverageMeter::new();
        for s in structures.iter().filter(|s| s.energy.is_some() && s.num_atoms() > 0) {
            let mut reference = 0.0;
            for &z in &s.atomic_numbers {
                reference += stats.atomic_energies[stats.species_index(z)?];
            }
            let per_atom = (s.energy.unwrap_or(0.0) - reference) / s.num_atoms() as f64;
            mean.update(per_atom, 1);
        }
        stats.mean = mean.avg;

        let mut squares = AverageMeter::new();
        for f in structures.iter().filter_map(|s| s.forces.as_ref()).flatten() {
            squares.update(f.iter().map(|c| c * c).sum::<f64>() / 3.0, 1);
        }
        if squares.count > 0 && squares.avg > 0.0 {
            stats.std = squares.avg.sqrt();
        }

        Ok(stats)
    }
}

/// Least-squares fit of `E ≈ Σ_z n_z e_z` with a tiny ridge term so that
/// species with collinear counts still give a solution.
pub fn fit_atomic_energies(structures: &[Structure], zs: &[u32]) -> Result<Vec<f64>> {
    let labelled: Vec<&Structure> = structures.iter().filter(|s| s.energy.is_some()).collect();
    if labelled.is_empty() {
        return Ok(vec![0.0; zs.len()]);
    }

    let mut rows = Vec::with_capacity(labelled.len());
    let mut targets = Vec::with_capacity(labelled.len());
    for s in &labelled {
        let mut counts = vec![0.0; zs.len()];
        for &z in &s.atomic_numbers {
            let k = zs.iter().position(|&x| x == z).ok_or(EquitrainError::UnknownSpecies(z))?;
            counts[k] += 1.0;
        }
        rows.push(counts);
        targets.push(s.energy.unwrap_or(0.0));
    }

    let a = Matrix::from_data(rows);
    let at = a.transpose();
    let normal = at.clone() * a + Matrix::identity(zs.len()).map(|x| x * 1e-8);
    let rhs = at.mul_vec(&targets);
    normal
        .solve(&rhs)
        .ok_or_else(|| EquitrainError::Dataset("could not fit atomic energies".to_string()))
}

/// Average node count, edge count and degree per graph, as seen by the loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphStats {
    pub avg_node: f64,
    pub avg_edge: f64,
    pub avg_degree: f64,
}

/// Walks one pass of the loader and reports running averages every
/// `print_freq` batches and on the last one.
pub fn graph_statistics(loader: &mut DataLoader, reporter: &dyn Reporter, print_freq: usize) -> GraphStats {
    reporter.info(&format!("Calculating statistics over {} graphs", loader.num_graphs()));

    let mut avg_node = AverageMeter::new();
    let mut avg_edge = AverageMeter::new();
    let mut avg_degree = AverageMeter::new();
    let len = loader.len();

    for (step, batch) in loader.iter().enumerate() {
        let graphs = batch.num_graphs();
        let nodes = batch.num_atoms();
        if graphs == 0 || nodes == 0 {
            continue;
        }
        avg_node.update(nodes as f64 / graphs as f64, graphs);
        avg_edge.update(batch.num_edges() as f64 / graphs as f64, graphs);
        avg_degree.update(batch.num_edges() as f64 / nodes as f64, nodes);

        if step % print_freq.max(1) == 0 || step + 1 == len {
            reporter.info(&format!(
                "[{step}/{len}]\tavg node: {}, avg edge: {}, avg degree: {}",
                avg_node.avg, avg_edge.avg, avg_degree.avg
            ));
        }
    }

    GraphStats {
        avg_node: avg_node.avg,
        avg_edge: avg_edge.avg,
        avg_degree: avg_degree.avg,
    }
}
