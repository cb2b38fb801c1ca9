pub mod adam;
pub mod lookahead;
pub mod optimizer;
pub mod param_groups;
pub mod rmsprop;
pub mod scheduler;
pub mod sgd;

pub use optimizer::{Optimizer, OptimizerConfig, OptimizerKind, OptimizerName};
pub use scheduler::{PlateauMode, Scheduler, SchedulerConfig, SchedulerKind};
