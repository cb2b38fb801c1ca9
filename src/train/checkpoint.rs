use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EquitrainError, Result};
use crate::model::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::Scheduler;
use crate::train::best::BestMetrics;

pub const MODEL_FILE: &str = "model.json";
pub const OPTIMIZER_FILE: &str = "optimizer.json";
pub const SCHEDULER_FILE: &str = "scheduler.json";
pub const BEST_FILE: &str = "best.json";

/// `best_val_epochs@<epoch>_e@<energy>_f@<forces>`, with `nan` for an
/// inactive objective.
pub fn checkpoint_name(epoch: usize, energy: Option<f64>, forces: Option<f64>) -> String {
    format!("best_val_epochs@{epoch}_e@{}_f@{}", four_places(energy), four_places(forces))
}

fn four_places(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.4}"),
        _ => "nan".to_string(),
    }
}

/// Saved model parameters.
///
/// `architecture` is whatever the model needs to be rebuilt (for the pair
/// potential, its `PairPotentialConfig`); it is `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    #[serde(default)]
    pub architecture: serde_json::Value,
    pub names: Vec<String>,
    pub parameters: Vec<f64>,
}

impl ModelCheckpoint {
    pub fn capture(model: &dyn Model, architecture: serde_json::Value) -> Self {
        ModelCheckpoint {
            architecture,
            names: model.parameter_names(),
            parameters: model.parameters().to_vec(),
        }
    }

    /// Reads `model.json` from a checkpoint directory, or the file itself
    /// when `path` is not a directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.is_dir() { path.join(MODEL_FILE) } else { path.to_path_buf() };
        read_json(&file)
    }

    /// Copies the parameters into `model`. Names must match one to one.
    pub fn restore_into(&self, model: &mut dyn Model) -> Result<()> {
        let names = model.parameter_names();
        if names != self.names {
            return Err(EquitrainError::Checkpoint(format!(
                "model has {} parameters, checkpoint has {} with different names",
                names.len(),
                self.names.len()
            )));
        }
        if self.parameters.len() != names.len() {
            return Err(EquitrainError::Checkpoint(format!(
                "{} names but {} values",
                names.len(),
                self.parameters.len()
            )));
        }
        model.parameters_mut().copy_from_slice(&self.parameters);
        Ok(())
    }
}

/// Everything a full resume needs.
pub struct TrainState<'a> {
    pub model: &'a dyn Model,
    pub optimizer: &'a Optimizer,
    pub scheduler: &'a Scheduler,
    pub best: &'a BestMetrics,
}

/// Where the loop puts checkpoints when validation improves.
pub trait CheckpointSink {
    fn save(&mut self, name: &str, state: &TrainState<'_>) -> Result<()>;
}

/// Writes each checkpoint as a directory under `output_dir`.
pub struct DirectoryCheckpointer {
    output_dir: PathBuf,
    architecture: serde_json::Value,
    last: Option<PathBuf>,
}

impl DirectoryCheckpointer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        DirectoryCheckpointer {
            output_dir: output_dir.into(),
            architecture: serde_json::Value::Null,
            last: None,
        }
    }

    pub fn with_architecture(mut self, architecture: serde_json::Value) -> Self {
        self.architecture = architecture;
        self
    }

    /// Directory of the most recent checkpoint written.
    pub fn last(&self) -> Option<&Path> {
        self.last.as_deref()
    }
}

impl CheckpointSink for DirectoryCheckpointer {
    fn save(&mut self, name: &str, state: &TrainState<'_>) -> Result<()> {
        let dir = self.output_dir.join(name);
        fs::create_dir_all(&dir).map_err(|e| EquitrainError::io(&dir, e))?;

        let model = ModelCheckpoint::capture(state.model, self.architecture.clone());
        write_json(&dir.join(MODEL_FILE), &model)?;
        write_json(&dir.join(OPTIMIZER_FILE), state.optimizer)?;
        write_json(&dir.join(SCHEDULER_FILE), state.scheduler)?;
        write_json(&dir.join(BEST_FILE), state.best)?;

        self.last = Some(dir);
        Ok(())
    }
}

/// Restores a full checkpoint directory into the given training state.
///
/// The scheduler keeps its current configuration and only resumes the
/// saved progress.
pub fn load_checkpoint(
    dir: &Path,
    model: &mut dyn Model,
    optimizer: &mut Optimizer,
    scheduler: &mut Scheduler,
    best: &mut BestMetrics,
) -> Result<()> {
    ModelCheckpoint::load(dir)?.restore_into(model)?;

    let restored: Optimizer = read_json(&dir.join(OPTIMIZER_FILE))?;
    if restored.num_parameters() != model.num_parameters() {
        return Err(EquitrainError::Checkpoint(format!(
            "optimizer state covers {} parameters, model has {}",
            restored.num_parameters(),
            model.num_parameters()
        )));
    }
    *optimizer = restored;
    scheduler.restore_state(read_json(&dir.join(SCHEDULER_FILE))?);
    *best = read_json(&dir.join(BEST_FILE))?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| EquitrainError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|e| EquitrainError::json(path, e))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| EquitrainError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| EquitrainError::json(path, e))
}
