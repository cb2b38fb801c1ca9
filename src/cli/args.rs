use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

/// Input and output locations shared by every command.
#[derive(Debug, Clone, Default, Args, Serialize)]
pub struct FileArgs {
    /// Training set (extended XYZ or JSON for preprocess, graph JSON for train).
    #[arg(long)]
    pub train_file: Option<PathBuf>,
    /// Validation set.
    #[arg(long)]
    pub valid_file: Option<PathBuf>,
    /// Test set.
    #[arg(long)]
    pub test_file: Option<PathBuf>,
    /// Output directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Batching and randomness.
#[derive(Debug, Clone, Args, Serialize)]
pub struct DataArgs {
    /// Batch size for computation.
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
    /// Batches prepared ahead by the background loader; 0 loads inline.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    /// Random seed for splits, shuffling and initialisation.
    #[arg(long, default_value_t = 123)]
    pub seed: u64,
}

impl Default for DataArgs {
    fn default() -> Self {
        DataArgs { batch_size: 16, workers: 4, seed: 123 }
    }
}

/// Model construction, checkpoints and loss weights.
#[derive(Debug, Clone, Args, Serialize)]
pub struct ModelArgs {
    /// Resume from a full checkpoint directory (model, optimizer, scheduler, best).
    #[arg(long)]
    pub load_checkpoint: Option<PathBuf>,
    /// Load model parameters only, from a checkpoint directory or model.json.
    #[arg(long)]
    pub load_checkpoint_model: Option<PathBuf>,
    /// Weight for energy loss.
    #[arg(long, default_value_t = 1.0)]
    pub energy_weight: f64,
    /// Weight for forces loss.
    #[arg(long, default_value_t = 1.0)]
    pub forces_weight: f64,
    /// Weight for stress loss.
    #[arg(long, default_value_t = 0.0)]
    pub stress_weight: f64,
    /// Regression loss applied to each objective [mae, mse, huber].
    #[arg(long, default_value = "mae")]
    pub loss_type: String,
    /// Compare energies per atom instead of per structure.
    #[arg(long, default_value_t = false)]
    pub energy_per_atom: bool,
    /// Number of radial basis functions of the pair potential.
    #[arg(long, default_value_t = 8)]
    pub n_basis: usize,
}

impl Default for ModelArgs {
    fn default() -> Self {
        ModelArgs {
            load_checkpoint: None,
            load_checkpoint_model: None,
            energy_weight: 1.0,
            forces_weight: 1.0,
            stress_weight: 0.0,
            loss_type: "mae".to_string(),
            energy_per_atom: false,
            n_basis: 8,
        }
    }
}

/// Optimizer and learning-rate schedule.
#[derive(Debug, Clone, Args, Serialize)]
pub struct OptimizerArgs {
    /// Optimizer, optionally prefixed with `lookahead_` (e.g. adamw).
    #[arg(long, default_value = "adamw")]
    pub opt: String,
    /// Learning rate.
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,
    /// Weight decay.
    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,
    /// Smoothing constant for RMSprop.
    #[arg(long, default_value_t = 0.99)]
    pub alpha: f64,
    /// SGD momentum.
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,
    /// Lower bound on the learning rate.
    #[arg(long, default_value_t = 0.0)]
    pub min_lr: f64,
    /// Term added to denominators for numerical stability.
    #[arg(long, default_value_t = 1e-8)]
    pub eps: f64,
    /// Learning-rate schedule [plateau, step, cosine, fixed].
    #[arg(long, default_value = "plateau")]
    pub scheduler: String,
    /// Epochs without improvement before the plateau schedule reduces the rate.
    #[arg(long, default_value_t = 2)]
    pub plateau_patience: usize,
    /// Plateau reduction factor, new_lr = lr * factor.
    #[arg(long, default_value_t = 0.5)]
    pub plateau_factor: f64,
    /// Relative change that counts as an improvement.
    #[arg(long, default_value_t = 1e-4)]
    pub plateau_threshold: f64,
    /// min or max.
    #[arg(long, default_value = "min")]
    pub plateau_mode: String,
    /// Decay rate of the step schedule.
    #[arg(long, alias = "dr", default_value_t = 0.5)]
    pub decay_rate: f64,
    /// Epochs between decays of the step schedule.
    #[arg(long, default_value_t = 30)]
    pub decay_epochs: usize,
}

impl Default for OptimizerArgs {
    fn default() -> Self {
        OptimizerArgs {
            opt: "adamw".to_string(),
            lr: 0.01,
            weight_decay: 0.0,
            alpha: 0.99,
            momentum: 0.9,
            min_lr: 0.0,
            eps: 1e-8,
            scheduler: "plateau".to_string(),
            plateau_patience: 2,
            plateau_factor: 0.5,
            plateau_threshold: 1e-4,
            plateau_mode: "min".to_string(),
            decay_rate: 0.5,
            decay_epochs: 30,
        }
    }
}

#[derive(Debug, Clone, Args, Serialize)]
pub struct PreprocessArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub files: FileArgs,
    #[command(flatten)]
    #[serde(flatten)]
    pub data: DataArgs,
    /// Fraction of the training set split off for validation when no
    /// validation file is given.
    #[arg(long, default_value_t = 0.1)]
    pub valid_fraction: f64,
    /// Atomic numbers to include, e.g. "[1, 8]". Defaults to those in the data.
    #[arg(long)]
    pub atomic_numbers: Option<String>,
    /// "average" to fit isolated atom energies, or a mapping such as "{1: -13.6, 8: -2041.8}".
    #[arg(long, default_value = "average")]
    pub atomic_energies: String,
    /// Cutoff radius for graphs.
    #[arg(long, default_value_t = 4.5)]
    pub r_max: f64,
    /// Key of reference energies in the structure files.
    #[arg(long, default_value = "energy")]
    pub energy_key: String,
    /// Key of reference forces.
    #[arg(long, default_value = "forces")]
    pub forces_key: String,
    /// Key of reference stress.
    #[arg(long, default_value = "stress")]
    pub stress_key: String,
}

impl Default for PreprocessArgs {
    fn default() -> Self {
        PreprocessArgs {
            files: FileArgs::default(),
            data: DataArgs::default(),
            valid_fraction: 0.1,
            atomic_numbers: None,
            atomic_energies: "average".to_string(),
            r_max: 4.5,
            energy_key: "energy".to_string(),
            forces_key: "forces".to_string(),
            stress_key: "stress".to_string(),
        }
    }
}

#[derive(Debug, Clone, Args, Serialize)]
pub struct TrainArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub files: FileArgs,
    #[command(flatten)]
    #[serde(flatten)]
    pub data: DataArgs,
    #[command(flatten)]
    #[serde(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    #[serde(flatten)]
    pub optimizer: OptimizerArgs,
    /// statistics.json written by preprocess.
    #[arg(long)]
    pub statistics_file: Option<PathBuf>,
    /// Number of epochs.
    #[arg(long, default_value_t = 100)]
    pub epochs: usize,
    /// Shuffle the training set every epoch.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub shuffle: bool,
    /// Print interval during one epoch.
    #[arg(long, default_value_t = 100)]
    pub print_freq: usize,
    /// Skip training batches with more edges than this; 0 disables.
    #[arg(long, default_value_t = 0)]
    pub batch_edge_limit: usize,
    /// Only report node, edge and degree averages of the training set.
    #[arg(long, default_value_t = false)]
    pub compute_stats: bool,
}

impl Default for TrainArgs {
    fn default() -> Self {
        TrainArgs {
            files: FileArgs::default(),
            data: DataArgs::default(),
            model: ModelArgs::default(),
            optimizer: OptimizerArgs::default(),
            statistics_file: None,
            epochs: 100,
            shuffle: true,
            print_freq: 100,
            batch_edge_limit: 0,
            compute_stats: false,
        }
    }
}

#[derive(Debug, Clone, Args, Serialize)]
pub struct PredictArgs {
    /// Structures to evaluate (extended XYZ or JSON).
    #[arg(long)]
    pub input_file: Option<PathBuf>,
    /// Where to write predictions; printed to stdout when absent.
    #[arg(long)]
    pub output_file: Option<PathBuf>,
    /// Checkpoint directory or model.json to evaluate.
    #[arg(long)]
    pub load_checkpoint_model: Option<PathBuf>,
    /// Structures per forward pass.
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
}

impl Default for PredictArgs {
    fn default() -> Self {
        PredictArgs { input_file: None, output_file: None, load_checkpoint_model: None, batch_size: 16 }
    }
}
