pub mod generic;
pub mod loss_type;
pub mod weighted;

pub use generic::GenericLoss;
pub use loss_type::LossType;
pub use weighted::{compute_weighted_loss, LossRecord, LossWeights};
