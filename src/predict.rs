use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::PredictArgs;
use crate::data::{collate, read_structures, AtomicGraph, LabelKeys, Structure};
use crate::error::{EquitrainError, Result};
use crate::math::vec3::{Mat3, Vec3};
use crate::model::{Model, Outputs, PairPotential, PairPotentialConfig, Prediction};
use crate::report::{FileLogger, Reporter};
use crate::train::checkpoint::{write_json, ModelCheckpoint};

/// Model output for one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePrediction {
    pub energy: f64,
    pub forces: Vec<Vec3>,
    pub stress: Mat3,
}

const ALL_OUTPUTS: Outputs = Outputs { forces: true, stress: true };

/// Rebuilds a pair potential from a checkpoint directory or `model.json`.
pub fn load_model(path: &Path) -> Result<PairPotential> {
    let checkpoint = ModelCheckpoint::load(path)?;
    let config: PairPotentialConfig = serde_json::from_value(checkpoint.architecture.clone())
        .map_err(|e| EquitrainError::Checkpoint(format!("{}: no usable architecture ({e})", path.display())))?;
    let mut model = PairPotential::from_config(config);
    checkpoint.restore_into(&mut model)?;
    Ok(model)
}

/// Energy, forces and stress of a single structure.
pub fn predict_structure(model: &mut dyn Model, structure: &Structure, r_max: f64) -> Result<StructurePrediction> {
    structure.validate()?;
    let graph = AtomicGraph::from_structure(structure, r_max);
    let mut predictions = predict_graphs(model, &[graph])?;
    predictions
        .pop()
        .ok_or_else(|| EquitrainError::Dataset("model returned no prediction".to_string()))
}

/// Runs the model over `graphs` as one batch and splits the result per graph.
pub fn predict_graphs(model: &mut dyn Model, graphs: &[AtomicGraph]) -> Result<Vec<StructurePrediction>> {
    let batch = collate(graphs);
    let Prediction { energy, forces, stress } = model.forward(&batch, ALL_OUTPUTS)?;
    let forces = forces.ok_or(EquitrainError::MissingPrediction("forces"))?;
    let stress = stress.ok_or(EquitrainError::MissingPrediction("stress"))?;

    let mut out = Vec::with_capacity(graphs.len());
    let mut start = 0;
    for (g, &n) in batch.atoms_per_graph.iter().enumerate() {
        let s = stress[g];
        out.push(StructurePrediction {
            energy: energy[g],
            forces: forces[start..start + n].to_vec(),
            stress: [[s[0], s[1], s[2]], [s[3], s[4], s[5]], [s[6], s[7], s[8]]],
        });
        start += n;
    }
    Ok(out)
}

/// Evaluates a saved model on every structure in `--input-file`. When
/// `--output-file` is given the predictions are also written there as JSON.
pub fn predict(args: &PredictArgs) -> Result<Vec<StructurePrediction>> {
    let input = args.input_file.as_ref().ok_or(EquitrainError::MissingArgument("input-file"))?;
    let checkpoint = args
        .load_checkpoint_model
        .as_ref()
        .ok_or(EquitrainError::MissingArgument("load-checkpoint-model"))?;
    if args.batch_size == 0 {
        return Err(EquitrainError::InvalidArgument { name: "batch-size", reason: "must be positive".to_string() });
    }

    let reporter = FileLogger::console();
    let mut model = load_model(checkpoint)?;
    let r_max = model.config().r_max;
    reporter.info(&format!(
        "Loaded model from {} ({} parameters, r_max={r_max})",
        checkpoint.display(),
        model.num_parameters()
    ));

    let structures = read_structures(input, &LabelKeys::default())?;
    let graphs: Vec<AtomicGraph> = structures.iter().map(|s| AtomicGraph::from_structure(s, r_max)).collect();

    let mut predictions = Vec::with_capacity(graphs.len());
    for chunk in graphs.chunks(args.batch_size) {
        predictions.extend(predict_graphs(&mut model, chunk)?);
    }
    reporter.info(&format!("Predicted {} structures", predictions.len()));

    if let Some(path) = &args.output_file {
        write_json(path, &predictions)?;
    }
    Ok(predictions)
}
