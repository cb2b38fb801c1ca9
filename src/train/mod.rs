pub mod best;
pub mod checkpoint;
pub mod epoch_stats;
pub mod loop_fn;
pub mod loss_metrics;
pub mod meter;
pub mod train_config;
pub mod trainer;

pub use best::BestMetrics;
pub use checkpoint::{checkpoint_name, CheckpointSink, DirectoryCheckpointer, ModelCheckpoint, TrainState};
pub use epoch_stats::EpochStats;
pub use loop_fn::{TrainOutcome, TrainSession};
pub use loss_metrics::LossMetrics;
pub use meter::AverageMeter;
pub use train_config::TrainConfig;
pub use trainer::{train, train_with_reporter};
