use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cli::{format_options, parse_atomic_energies, parse_atomic_numbers, PreprocessArgs};
use crate::data::{read_structures, AtomicGraph, GraphDataset, LabelKeys, Statistics, Structure};
use crate::error::{EquitrainError, Result};
use crate::report::{FileLogger, Reporter};

pub const TRAIN_FILE: &str = "train.json";
pub const VALID_FILE: &str = "valid.json";
pub const TEST_FILE: &str = "test.json";
pub const STATISTICS_FILE: &str = "statistics.json";

/// What `preprocess` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessSummary {
    pub train: usize,
    pub valid: usize,
    pub test: Option<usize>,
    pub statistics: Statistics,
}

/// Converts structure files into graph datasets plus `statistics.json`
/// inside `--output-dir`, logging to `<output_dir>/debug.log`.
pub fn preprocess(args: &PreprocessArgs) -> Result<PreprocessSummary> {
    let output_dir = args.files.output_dir.as_ref().ok_or(EquitrainError::MissingArgument("output-dir"))?;
    args.files.train_file.as_ref().ok_or(EquitrainError::MissingArgument("train-file"))?;
    fs::create_dir_all(output_dir).map_err(|e| EquitrainError::io(output_dir, e))?;
    let reporter = FileLogger::new(output_dir)?;
    preprocess_with_reporter(args, &reporter)
}

pub fn preprocess_with_reporter(args: &PreprocessArgs, reporter: &dyn Reporter) -> Result<PreprocessSummary> {
    let train_file = args.files.train_file.as_ref().ok_or(EquitrainError::MissingArgument("train-file"))?;
    let output_dir = args.files.output_dir.as_ref().ok_or(EquitrainError::MissingArgument("output-dir"))?;
    if !(args.r_max > 0.0) {
        return Err(EquitrainError::InvalidArgument {
            name: "r-max",
            reason: format!("must be positive, got {}", args.r_max),
        });
    }
    if !(0.0..1.0).contains(&args.valid_fraction) {
        return Err(EquitrainError::InvalidArgument {
            name: "valid-fraction",
            reason: format!("must lie in [0, 1), got {}", args.valid_fraction),
        });
    }
    fs::create_dir_all(output_dir).map_err(|e| EquitrainError::io(output_dir, e))?;

    reporter.info(&format_options(args));

    let keys = LabelKeys {
        energy: args.energy_key.clone(),
        forces: args.forces_key.clone(),
        stress: args.stress_key.clone(),
    };

    let mut train = read_structures(train_file, &keys)?;
    reporter.info(&format!("Read {} structures from {}", train.len(), train_file.display()));

    let valid = match &args.files.valid_file {
        Some(path) => read_structures(path, &keys)?,
        None => {
            let (kept, split) = split_validation(train, args.valid_fraction, args.data.seed);
            reporter.info(&format!(
                "Using random {:.0}% of the training set for validation ({} structures)",
                100.0 * args.valid_fraction,
                split.len()
            ));
            train = kept;
            split
        }
    };
    let test = match &args.files.test_file {
        Some(path) => Some(read_structures(path, &keys)?),
        None => None,
    };

    if train.is_empty() {
        return Err(EquitrainError::Dataset("no training structures left after the validation split".to_string()));
    }

    let zs = match &args.atomic_numbers {
        Some(text) => {
            let mut zs = parse_atomic_numbers(text)?;
            zs.sort_unstable();
            zs.dedup();
            zs
        }
        None => species(&train),
    };
    for s in valid.iter().chain(test.iter().flatten()) {
        if let Some(&z) = s.atomic_numbers.iter().find(|z| zs.binary_search(z).is_err()) {
            return Err(EquitrainError::UnknownSpecies(z));
        }
    }

    let atomic_energies = match args.atomic_energies.trim() {
        "average" => None,
        text => Some(energies_for(&zs, &parse_atomic_energies(text)?)?),
    };

    let train_graphs = build_graphs(&train, args.r_max);
    let statistics = Statistics::compute(&train, &train_graphs, args.r_max, Some(zs), atomic_energies)?;
    reporter.info(&format!(
        "Atomic energies: {}",
        statistics
            .atomic_numbers
            .iter()
            .zip(&statistics.atomic_energies)
            .map(|(z, e)| format!("{z}: {e:.6}"))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    reporter.info(&format!(
        "avg_num_neighbors={:.4}, mean={:.6}, std={:.6}",
        statistics.avg_num_neighbors, statistics.mean, statistics.std
    ));

    write_dataset(&output_dir.join(TRAIN_FILE), args.r_max, train_graphs, reporter)?;
    let n_valid = valid.len();
    write_dataset(&output_dir.join(VALID_FILE), args.r_max, build_graphs(&valid, args.r_max), reporter)?;
    let n_test = match &test {
        Some(test) => {
            write_dataset(&output_dir.join(TEST_FILE), args.r_max, build_graphs(test, args.r_max), reporter)?;
            Some(test.len())
        }
        None => None,
    };
    statistics.save_json(&output_dir.join(STATISTICS_FILE))?;

    Ok(PreprocessSummary { train: train.len(), valid: n_valid, test: n_test, statistics })
}

/// Shuffles with `seed` and moves `fraction` of the structures (at least
/// one when the fraction is positive and two or more are present) into the
/// validation set. Fractions above 1 move everything.
pub fn split_validation(structures: Vec<Structure>, fraction: f64, seed: u64) -> (Vec<Structure>, Vec<Structure>) {
    let n = structures.len();
    let mut n_valid = (fraction * n as f64) as usize;
    if fraction > 0.0 && n_valid == 0 && n >= 2 {
        n_valid = 1;
    }
    let n_valid = n_valid.min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let valid_set: BTreeSet<usize> = indices[n - n_valid..].iter().copied().collect();

    let mut train = Vec::with_capacity(n - n_valid);
    let mut valid = Vec::with_capacity(n_valid);
    for (i, s) in structures.into_iter().enumerate() {
        if valid_set.contains(&i) {
            valid.push(s);
        } else {
            train.push(s);
        }
    }
    (train, valid)
}

fn species(structures: &[Structure]) -> Vec<u32> {
    structures
        .iter()
        .flat_map(|s| s.atomic_numbers.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn energies_for(zs: &[u32], pairs: &[(u32, f64)]) -> Result<Vec<f64>> {
    zs.iter()
        .map(|z| {
            pairs
                .iter()
                .find(|(pz, _)| pz == z)
                .map(|&(_, e)| e)
                .ok_or_else(|| EquitrainError::InvalidArgument {
                    name: "atomic-energies",
                    reason: format!("no energy given for atomic number {z}"),
                })
        })
        .collect()
}

fn build_graphs(structures: &[Structure], r_max: f64) -> Vec<AtomicGraph> {
    structures.iter().map(|s| AtomicGraph::from_structure(s, r_max)).collect()
}

fn write_dataset(path: &Path, r_max: f64, graphs: Vec<AtomicGraph>, reporter: &dyn Reporter) -> Result<()> {
    let dataset = GraphDataset::new(r_max, graphs);
    dataset.save_json(path)?;
    reporter.info(&format!("Wrote {} graphs to {}", dataset.len(), path.display()));
    Ok(())
}
