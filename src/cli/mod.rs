pub mod args;
pub mod options;

pub use args::{DataArgs, FileArgs, ModelArgs, OptimizerArgs, PredictArgs, PreprocessArgs, TrainArgs};
pub use options::{format_options, parse_atomic_energies, parse_atomic_numbers};
