use serde::{Deserialize, Serialize};

use crate::data::neighbors::neighbor_list;
use crate::data::structure::Structure;
use crate::math::vec3::{self, Mat3, Vec3};

/// A preprocessed structure: atoms, neighbour edges and reference labels.
///
/// Missing labels are stored as zeros, so every graph carries the same
/// fields regardless of what the source file provided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicGraph {
    pub atomic_numbers: Vec<u32>,
    pub positions: Vec<Vec3>,
    /// `[sender, receiver]` pairs.
    pub edge_index: Vec<[usize; 2]>,
    pub shifts: Vec<Vec3>,
    pub volume: Option<f64>,
    pub energy: f64,
    pub forces: Vec<Vec3>,
    pub stress: Mat3,
}

impl AtomicGraph {
    pub fn from_structure(structure: &Structure, r_max: f64) -> AtomicGraph {
        let nl = neighbor_list(&structure.positions, structure.cell.as_ref(), structure.pbc, r_max);
        let n = structure.num_atoms();
        AtomicGraph {
            atomic_numbers: structure.atomic_numbers.clone(),
            positions: structure.positions.clone(),
            edge_index: nl.senders.iter().zip(&nl.receivers).map(|(&s, &r)| [s, r]).collect(),
            shifts: nl.shifts,
            volume: structure.volume(),
            energy: structure.energy.unwrap_or(0.0),
            forces: structure.forces.clone().unwrap_or_else(|| vec![[0.0; 3]; n]),
            stress: structure.stress.unwrap_or([[0.0; 3]; 3]),
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }
}

/// Several graphs concatenated into one disconnected graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphBatch {
    pub atomic_numbers: Vec<u32>,
    pub positions: Vec<Vec3>,
    /// Graph index of every atom.
    pub batch: Vec<usize>,
    /// Edges with atom indices offset into the batch.
    pub edge_index: Vec<[usize; 2]>,
    pub shifts: Vec<Vec3>,
    pub volume: Vec<Option<f64>>,
    pub energy: Vec<f64>,
    pub forces: Vec<Vec3>,
    /// One row-major 3x3 tensor per graph.
    pub stress: Vec<[f64; 9]>,
    pub atoms_per_graph: Vec<usize>,
}

impl GraphBatch {
    pub fn num_graphs(&self) -> usize {
        self.energy.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }
}

/// Concatenates graphs into a batch, offsetting edge indices.
pub fn collate<'a, I>(graphs: I) -> GraphBatch
where
    I: IntoIterator<Item = &'a AtomicGraph>,
{
    let mut out = GraphBatch::default();

    for (g, graph) in graphs.into_iter().enumerate() {
        let offset = out.atomic_numbers.len();
        out.atomic_numbers.extend_from_slice(&graph.atomic_numbers);
        out.positions.extend_from_slice(&graph.positions);
        out.batch.extend(std::iter::repeat(g).take(graph.num_atoms()));
        out.edge_index
            .extend(graph.edge_index.iter().map(|&[s, r]| [s + offset, r + offset]));
        out.shifts.extend_from_slice(&graph.shifts);
        out.volume.push(graph.volume);
        out.energy.push(graph.energy);
        out.forces.extend_from_slice(&graph.forces);
        out.stress.push(vec3::flatten(&graph.stress));
        out.atoms_per_graph.push(graph.num_atoms());
    }

    out
}
