pub mod cli;
pub mod data;
pub mod error;
pub mod loss;
pub mod math;
pub mod model;
pub mod optim;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod train;

// Convenience re-exports
pub use error::{EquitrainError, Result};
pub use loss::{compute_weighted_loss, GenericLoss, LossRecord, LossWeights};
pub use model::{Model, PairPotential};
pub use optim::{Optimizer, Scheduler};
pub use predict::{predict, predict_structure};
pub use preprocess::preprocess;
pub use report::{FileLogger, NoOpReporter, Reporter};
pub use train::{train, AverageMeter, BestMetrics, LossMetrics, TrainConfig, TrainSession};
