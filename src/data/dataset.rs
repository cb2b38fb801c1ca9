use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::graph::AtomicGraph;
use crate::error::{EquitrainError, Result};

/// On-disk collection of preprocessed graphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDataset {
    /// Cutoff used to build the edges.
    pub r_max: f64,
    pub graphs: Vec<AtomicGraph>,
}

impl GraphDataset {
    pub fn new(r_max: f64, graphs: Vec<AtomicGraph>) -> Self {
        GraphDataset { r_max, graphs }
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Serializes the dataset to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| EquitrainError::io(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| EquitrainError::json(path, e))
    }

    /// Deserializes a dataset written by `save_json` and checks that every
    /// graph is internally consistent.
    pub fn load_json(path: &Path) -> Result<GraphDataset> {
        let file = File::open(path).map_err(|e| EquitrainError::io(path, e))?;
        let dataset: GraphDataset = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EquitrainError::json(path, e))?;

        for (i, g) in dataset.graphs.iter().enumerate() {
            let n = g.num_atoms();
            if g.positions.len() != n || g.forces.len() != n {
                return Err(EquitrainError::Dataset(format!(
                    "{}: graph {i} has inconsistent per-atom arrays",
                    path.display()
                )));
            }
            if g.shifts.len() != g.num_edges() || g.edge_index.iter().any(|e| e[0] >= n || e[1] >= n) {
                return Err(EquitrainError::Dataset(format!(
                    "{}: graph {i} has invalid edges",
                    path.display()
                )));
            }
        }
        Ok(dataset)
    }
}
