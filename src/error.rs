use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EquitrainError>;

/// Errors raised by the training harness.
///
/// Configuration problems (missing arguments, unknown optimizer or scheduler
/// names) surface before any training resources are acquired. Everything
/// else is fatal for the run and is propagated to the caller unchanged.
#[derive(Debug, Error)]
pub enum EquitrainError {
    #[error("--{0} is a required argument")]
    MissingArgument(&'static str),

    #[error("invalid optimizer `{0}`")]
    UnknownOptimizer(String),

    #[error("invalid scheduler `{0}`")]
    UnknownScheduler(String),

    #[error("invalid loss type `{0}`")]
    UnknownLoss(String),

    #[error("invalid argument --{name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("unknown element `{0}`")]
    UnknownElement(String),

    #[error("atomic number {0} is not in the statistics table")]
    UnknownSpecies(u32),

    #[error("invalid dataset: {0}")]
    Dataset(String),

    #[error("model did not predict {0} although its loss weight is positive")]
    MissingPrediction(&'static str),

    #[error("checkpoint mismatch: {0}")]
    Checkpoint(String),
}

impl EquitrainError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EquitrainError::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        EquitrainError::Json { path: path.into(), source }
    }
}
