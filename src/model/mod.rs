pub mod model;
pub mod pair_potential;
pub mod radial;

pub use model::{Model, Outputs, Prediction, PredictionGrad};
pub use pair_potential::{PairPotential, PairPotentialConfig};
pub use radial::RadialBasis;
