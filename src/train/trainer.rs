use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{format_options, TrainArgs};
use crate::data::{graph_statistics, DataLoader, GraphDataset, Statistics};
use crate::error::{EquitrainError, Result};
use crate::loss::{GenericLoss, LossType, LossWeights};
use crate::model::pair_potential::PairPotential;
use crate::optim::{Optimizer, OptimizerConfig, OptimizerName, PlateauMode, Scheduler, SchedulerConfig, SchedulerKind};
use crate::report::{FileLogger, Reporter};
use crate::train::best::BestMetrics;
use crate::train::checkpoint::{load_checkpoint, DirectoryCheckpointer, ModelCheckpoint};
use crate::train::loop_fn::{TrainOutcome, TrainSession};
use crate::train::train_config::TrainConfig;

/// Paths a training run cannot start without.
struct RequiredPaths {
    train_file: PathBuf,
    valid_file: PathBuf,
    statistics_file: PathBuf,
    output_dir: PathBuf,
}

fn required_paths(args: &TrainArgs) -> Result<RequiredPaths> {
    let get = |value: &Option<PathBuf>, name: &'static str| {
        value.clone().ok_or(EquitrainError::MissingArgument(name))
    };
    Ok(RequiredPaths {
        train_file: get(&args.files.train_file, "train-file")?,
        valid_file: get(&args.files.valid_file, "valid-file")?,
        statistics_file: get(&args.statistics_file, "statistics-file")?,
        output_dir: get(&args.files.output_dir, "output-dir")?,
    })
}

/// Trains a pair potential from preprocessed graph files, logging to the
/// console and to `<output_dir>/debug.log`.
///
/// Returns `None` when `--compute-stats` only reported graph statistics.
pub fn train(args: &TrainArgs) -> Result<Option<TrainOutcome>> {
    let paths = required_paths(args)?;
    validate(args)?;
    fs::create_dir_all(&paths.output_dir).map_err(|e| EquitrainError::io(&paths.output_dir, e))?;
    let reporter = FileLogger::new(&paths.output_dir)?;
    train_with_reporter(args, &reporter)
}

/// Same as `train`, with the log sink supplied by the caller.
pub fn train_with_reporter(args: &TrainArgs, reporter: &dyn Reporter) -> Result<Option<TrainOutcome>> {
    let paths = required_paths(args)?;
    validate(args)?;
    fs::create_dir_all(&paths.output_dir).map_err(|e| EquitrainError::io(&paths.output_dir, e))?;

    reporter.info(&format_options(args));

    let statistics = Statistics::load_json(&paths.statistics_file)?;

    let Loaders { train: mut train_loader, valid: mut valid_loader, test: mut test_loader } =
        loaders(&paths, &statistics, args, reporter)?;

    if args.compute_stats {
        graph_statistics(&mut train_loader, reporter, args.print_freq);
        return Ok(None);
    }

    let mut model = PairPotential::new(&statistics, args.model.n_basis, args.data.seed);
    if let Some(path) = &args.model.load_checkpoint_model {
        reporter.info(&format!("Loading model checkpoint {}...", path.display()));
        ModelCheckpoint::load(path)?.restore_into(&mut model)?;
    }

    let weights = LossWeights::new(args.model.energy_weight, args.model.forces_weight, args.model.stress_weight);
    let loss = GenericLoss::new(weights)
        .with_loss_type(args.model.loss_type.parse::<LossType>()?)
        .with_energy_per_atom(args.model.energy_per_atom);

    let mut optimizer = Optimizer::new(&optimizer_config(args)?, &model)?;
    let mut scheduler = Scheduler::new(scheduler_config(args)?, &optimizer)?;
    let mut best = BestMetrics::default();

    if let Some(path) = &args.model.load_checkpoint {
        reporter.info(&format!("Loading checkpoint {}...", path.display()));
        load_checkpoint(path, &mut model, &mut optimizer, &mut scheduler, &mut best)?;
    }

    let architecture = serde_json::to_value(model.config()).map_err(|e| EquitrainError::json(&paths.output_dir, e))?;
    let mut checkpoints = DirectoryCheckpointer::new(&paths.output_dir).with_architecture(architecture);

    let mut config = TrainConfig::new(args.epochs);
    config.print_freq = args.print_freq;
    config.batch_edge_limit = args.batch_edge_limit;

    let mut session = TrainSession::new(&mut model, optimizer, scheduler, loss, config, reporter)
        .with_checkpoints(&mut checkpoints)
        .with_best(best);
    let outcome = session.run(&mut train_loader, &mut valid_loader, test_loader.as_mut())?;

    Ok(Some(outcome))
}

/// Checks every option that needs no file access, so a typo fails before
/// the output directory or any dataset is touched.
fn validate(args: &TrainArgs) -> Result<()> {
    args.optimizer.opt.parse::<OptimizerName>()?;
    args.optimizer.scheduler.parse::<SchedulerKind>()?;
    args.optimizer.plateau_mode.parse::<PlateauMode>()?;
    args.model.loss_type.parse::<LossType>()?;

    let positive = |value: usize, name: &'static str| {
        if value == 0 {
            Err(EquitrainError::InvalidArgument { name, reason: "must be positive".to_string() })
        } else {
            Ok(())
        }
    };
    positive(args.epochs, "epochs")?;
    positive(args.data.batch_size, "batch-size")?;
    positive(args.print_freq, "print-freq")?;
    positive(args.model.n_basis, "n-basis")?;

    for (value, name) in [
        (args.model.energy_weight, "energy-weight"),
        (args.model.forces_weight, "forces-weight"),
        (args.model.stress_weight, "stress-weight"),
    ] {
        if !(value >= 0.0) {
            return Err(EquitrainError::InvalidArgument {
                name,
                reason: format!("must be non-negative, got {value}"),
            });
        }
    }
    Ok(())
}

pub fn optimizer_config(args: &TrainArgs) -> Result<OptimizerConfig> {
    let opt = &args.optimizer;
    let mut config = OptimizerConfig::new(opt.opt.parse()?, opt.lr);
    config.weight_decay = opt.weight_decay;
    config.momentum = opt.momentum;
    config.alpha = opt.alpha;
    config.eps = opt.eps;
    Ok(config)
}

pub fn scheduler_config(args: &TrainArgs) -> Result<SchedulerConfig> {
    let opt = &args.optimizer;
    let mut config = SchedulerConfig::new(opt.scheduler.parse()?, args.epochs);
    config.min_lr = opt.min_lr;
    config.decay_rate = opt.decay_rate;
    config.decay_epochs = opt.decay_epochs;
    config.plateau_patience = opt.plateau_patience;
    config.plateau_factor = opt.plateau_factor;
    config.plateau_threshold = opt.plateau_threshold;
    config.plateau_mode = opt.plateau_mode.parse()?;
    Ok(config)
}

/// Validation and test graphs are evaluated one at a time, so their averages
/// are per structure.
const EVAL_BATCH_SIZE: usize = 1;

struct Loaders {
    train: DataLoader,
    valid: DataLoader,
    test: Option<DataLoader>,
}

fn loaders(paths: &RequiredPaths, statistics: &Statistics, args: &TrainArgs, reporter: &dyn Reporter) -> Result<Loaders> {
    let mut train = loader(&paths.train_file, args.data.batch_size, statistics, args, reporter)?;
    if args.shuffle {
        train = train.shuffled(args.data.seed);
    }
    let valid = loader(&paths.valid_file, EVAL_BATCH_SIZE, statistics, args, reporter)?;
    let test = match &args.files.test_file {
        Some(path) => Some(loader(path, EVAL_BATCH_SIZE, statistics, args, reporter)?),
        None => None,
    };
    Ok(Loaders { train, valid, test })
}

fn loader(
    path: &Path,
    batch_size: usize,
    statistics: &Statistics,
    args: &TrainArgs,
    reporter: &dyn Reporter,
) -> Result<DataLoader> {
    let dataset = GraphDataset::load_json(path)?;
    if (dataset.r_max - statistics.r_max).abs() > 1e-9 {
        reporter.info(&format!(
            "Warning: {} was built with r_max={} but statistics use r_max={}",
            path.display(),
            dataset.r_max,
            statistics.r_max
        ));
    }
    Ok(DataLoader::new(dataset, batch_size).with_workers(args.data.workers))
}
