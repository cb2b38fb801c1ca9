use crate::data::graph::GraphBatch;
use crate::error::Result;
use crate::math::vec3::Vec3;

/// Which derived quantities a forward pass must produce. Energy is always
/// computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outputs {
    pub forces: bool,
    pub stress: bool,
}

/// Model output for one batch. Quantities that were not requested are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    /// One value per graph.
    pub energy: Vec<f64>,
    /// One vector per atom.
    pub forces: Option<Vec<Vec3>>,
    /// One row-major 3x3 tensor per graph.
    pub stress: Option<Vec<[f64; 9]>>,
}

/// Derivative of the scalar training loss w.r.t. each entry of a
/// `Prediction`, laid out the same way.
pub type PredictionGrad = Prediction;

/// An interatomic potential the training loop can drive.
///
/// Parameters live in one flat vector; `parameter_names` gives each entry a
/// dotted name used for weight-decay grouping and checkpoints.
pub trait Model {
    /// Forward pass. Implementations may cache whatever `backward` needs.
    fn forward(&mut self, batch: &GraphBatch, outputs: Outputs) -> Result<Prediction>;

    /// Accumulates `d loss / d parameters` into `grads` given the gradient
    /// w.r.t. the last forward pass's prediction.
    fn backward(&mut self, grad: &PredictionGrad, grads: &mut [f64]);

    fn parameters(&self) -> &[f64];

    fn parameters_mut(&mut self) -> &mut [f64];

    fn parameter_names(&self) -> Vec<String>;

    /// Parameter names that never receive weight decay, on top of the bias
    /// naming rule.
    fn no_weight_decay(&self) -> Vec<String> {
        Vec::new()
    }

    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }
}
