use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::xyz;
use crate::error::{EquitrainError, Result};
use crate::math::vec3::{self, Mat3, Vec3};

/// One atomic configuration with its optional reference labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub atomic_numbers: Vec<u32>,
    pub positions: Vec<Vec3>,
    /// Lattice vectors as rows.
    #[serde(default)]
    pub cell: Option<Mat3>,
    #[serde(default)]
    pub pbc: [bool; 3],
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub forces: Option<Vec<Vec3>>,
    /// Full 3x3 stress tensor.
    #[serde(default)]
    pub stress: Option<Mat3>,
}

impl Structure {
    pub fn num_atoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// Cell volume, when a non-degenerate cell is present.
    pub fn volume(&self) -> Option<f64> {
        self.cell
            .as_ref()
            .map(|c| vec3::det(c).abs())
            .filter(|v| *v > 1e-12)
    }

    pub fn validate(&self) -> Result<()> {
        if self.positions.len() != self.atomic_numbers.len() {
            return Err(EquitrainError::Dataset(format!(
                "{} positions for {} atoms",
                self.positions.len(),
                self.atomic_numbers.len()
            )));
        }
        if let Some(forces) = &self.forces {
            if forces.len() != self.atomic_numbers.len() {
                return Err(EquitrainError::Dataset(format!(
                    "{} force vectors for {} atoms",
                    forces.len(),
                    self.atomic_numbers.len()
                )));
            }
        }
        if self.pbc.iter().any(|&p| p) && self.volume().is_none() {
            return Err(EquitrainError::Dataset(
                "periodic structure without a valid cell".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which keys hold the reference labels in an extended XYZ file.
#[derive(Debug, Clone)]
pub struct LabelKeys {
    pub energy: String,
    pub forces: String,
    pub stress: String,
}

impl Default for LabelKeys {
    fn default() -> Self {
        LabelKeys {
            energy: "energy".to_string(),
            forces: "forces".to_string(),
            stress: "stress".to_string(),
        }
    }
}

/// Reads structures from `.json` (array of `Structure`) or extended XYZ
/// (anything else).
pub fn read_structures(path: &Path, keys: &LabelKeys) -> Result<Vec<Structure>> {
    let structures = if path.extension().is_some_and(|ext| ext == "json") {
        let file = File::open(path).map_err(|e| EquitrainError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| EquitrainError::json(path, e))?
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| EquitrainError::io(path, e))?;
        xyz::parse_extxyz(&text, keys).map_err(|(line, reason)| EquitrainError::Parse {
            path: path.to_path_buf(),
            line,
            reason,
        })?
    };

    for s in &structures {
        s.validate()?;
    }
    Ok(structures)
}
