use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EquitrainError, Result};
use crate::model::model::Model;
use crate::optim::adam::{Adam, AdamVariant};
use crate::optim::lookahead::Lookahead;
use crate::optim::param_groups::weight_decay_groups;
use crate::optim::rmsprop::{Adadelta, RmsProp};
use crate::optim::sgd::Sgd;

/// Supported optimizers. Anything else is rejected when the optimizer is
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// SGD with Nesterov momentum (also accepted as `nesterov`).
    Sgd,
    /// SGD with classical momentum.
    Momentum,
    Adam,
    AdamW,
    Nadam,
    RAdam,
    AdaBelief,
    Adadelta,
    RmsProp,
}

/// Parsed `--opt` value: the base optimizer and whether it is wrapped in
/// lookahead (`lookahead_<name>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerName {
    pub kind: OptimizerKind,
    pub lookahead: bool,
}

impl FromStr for OptimizerName {
    type Err = EquitrainError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let parts: Vec<&str> = lower.split('_').collect();
        let (prefix, base) = match parts.as_slice() {
            [base] => (None, *base),
            [prefix, base] => (Some(*prefix), *base),
            _ => return Err(EquitrainError::UnknownOptimizer(s.to_string())),
        };
        let lookahead = match prefix {
            None => false,
            Some("lookahead") => true,
            Some(_) => return Err(EquitrainError::UnknownOptimizer(s.to_string())),
        };

        let kind = match base {
            "sgd" | "nesterov" => OptimizerKind::Sgd,
            "momentum"         => OptimizerKind::Momentum,
            "adam"             => OptimizerKind::Adam,
            "adamw"            => OptimizerKind::AdamW,
            "nadam"            => OptimizerKind::Nadam,
            "radam"            => OptimizerKind::RAdam,
            "adabelief"        => OptimizerKind::AdaBelief,
            "adadelta"         => OptimizerKind::Adadelta,
            "rmsprop"          => OptimizerKind::RmsProp,
            _ => return Err(EquitrainError::UnknownOptimizer(s.to_string())),
        };
        Ok(OptimizerName { kind, lookahead })
    }
}

impl fmt::Display for OptimizerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lookahead {
            f.write_str("lookahead_")?;
        }
        let base = match self.kind {
            OptimizerKind::Sgd       => "sgd",
            OptimizerKind::Momentum  => "momentum",
            OptimizerKind::Adam      => "adam",
            OptimizerKind::AdamW     => "adamw",
            OptimizerKind::Nadam     => "nadam",
            OptimizerKind::RAdam     => "radam",
            OptimizerKind::AdaBelief => "adabelief",
            OptimizerKind::Adadelta  => "adadelta",
            OptimizerKind::RmsProp   => "rmsprop",
        };
        f.write_str(base)
    }
}

/// Hyperparameters shared by the optimizer family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub name: OptimizerName,
    pub lr: f64,
    pub weight_decay: f64,
    pub momentum: f64,
    /// RMSprop smoothing constant.
    pub alpha: f64,
    pub eps: f64,
    pub betas: (f64, f64),
    /// Exempt biases and normalisation parameters from weight decay.
    pub filter_bias_and_norm: bool,
}

impl OptimizerConfig {
    pub fn new(name: OptimizerName, lr: f64) -> Self {
        OptimizerConfig {
            name,
            lr,
            weight_decay: 0.0,
            momentum: 0.9,
            alpha: 0.99,
            eps: 1e-8,
            betas: (0.9, 0.999),
            filter_bias_and_norm: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inner {
    Sgd(Sgd),
    Adam(Adam),
    RmsProp(RmsProp),
    Adadelta(Adadelta),
}

/// A built optimizer: per-parameter decay, update rule state and the
/// current learning rate. Serializable so that a run can be resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimizer {
    name: OptimizerName,
    lr: f64,
    decay: Vec<f64>,
    inner: Inner,
    lookahead: Option<Lookahead>,
}

impl Optimizer {
    /// Builds the optimizer for `model`'s current parameters.
    pub fn new(config: &OptimizerConfig, model: &dyn Model) -> Result<Optimizer> {
        if !(config.lr > 0.0) {
            return Err(EquitrainError::InvalidArgument {
                name: "lr",
                reason: format!("must be positive, got {}", config.lr),
            });
        }
        if config.weight_decay < 0.0 {
            return Err(EquitrainError::InvalidArgument {
                name: "weight-decay",
                reason: format!("must be non-negative, got {}", config.weight_decay),
            });
        }

        let n = model.num_parameters();
        let decay = weight_decay_groups(
            &model.parameter_names(),
            &model.no_weight_decay(),
            config.weight_decay,
            config.filter_bias_and_norm,
        );

        let adam = |variant| Inner::Adam(Adam::new(n, variant, config.betas, config.eps));
        let inner = match config.name.kind {
            OptimizerKind::Sgd       => Inner::Sgd(Sgd::new(n, config.momentum, true)),
            OptimizerKind::Momentum  => Inner::Sgd(Sgd::new(n, config.momentum, false)),
            OptimizerKind::Adam      => adam(AdamVariant::Adam),
            OptimizerKind::AdamW     => adam(AdamVariant::AdamW),
            OptimizerKind::Nadam     => adam(AdamVariant::Nadam),
            OptimizerKind::RAdam     => adam(AdamVariant::RAdam),
            OptimizerKind::AdaBelief => adam(AdamVariant::AdaBelief),
            OptimizerKind::Adadelta  => Inner::Adadelta(Adadelta::new(n, config.eps)),
            OptimizerKind::RmsProp   => {
                Inner::RmsProp(RmsProp::new(n, config.alpha, config.momentum, config.eps))
            }
        };

        Ok(Optimizer {
            name: config.name,
            lr: config.lr,
            decay,
            inner,
            lookahead: config.name.lookahead.then(|| Lookahead::new(model.parameters())),
        })
    }

    pub fn name(&self) -> OptimizerName {
        self.name
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    pub fn num_parameters(&self) -> usize {
        self.decay.len()
    }

    /// Applies one update to `params` from `grads`.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        let lr = self.lr;
        match &mut self.inner {
            Inner::Sgd(opt)      => opt.step(params, grads, &self.decay, lr),
            Inner::Adam(opt)     => opt.step(params, grads, &self.decay, lr),
            Inner::RmsProp(opt)  => opt.step(params, grads, &self.decay, lr),
            Inner::Adadelta(opt) => opt.step(params, grads, &self.decay, lr),
        }
        if let Some(lookahead) = &mut self.lookahead {
            lookahead.after_step(params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::graph::GraphBatch;
    use crate::model::model::{Outputs, Prediction, PredictionGrad};

    struct TwoParams {
        params: Vec<f64>,
    }

    impl Model for TwoParams {
        fn forward(&mut self, _batch: &GraphBatch, _outputs: Outputs) -> Result<Prediction> {
            Ok(Prediction::default())
        }
        fn backward(&mut self, _grad: &PredictionGrad, _grads: &mut [f64]) {}
        fn parameters(&self) -> &[f64] {
            &self.params
        }
        fn parameters_mut(&mut self) -> &mut [f64] {
            &mut self.params
        }
        fn parameter_names(&self) -> Vec<String> {
            vec!["head.bias".to_string(), "head.weight".to_string()]
        }
    }

    fn model() -> TwoParams {
        TwoParams { params: vec![1.0, 1.0] }
    }

    #[test]
    fn parses_the_vocabulary() {
        let name: OptimizerName = "AdamW".parse().unwrap();
        assert_eq!(name, OptimizerName { kind: OptimizerKind::AdamW, lookahead: false });
        let name: OptimizerName = "lookahead_radam".parse().unwrap();
        assert_eq!(name, OptimizerName { kind: OptimizerKind::RAdam, lookahead: true });
        assert_eq!("nesterov".parse::<OptimizerName>().unwrap().kind, OptimizerKind::Sgd);
        assert_eq!(name.to_string(), "lookahead_radam");
    }

    #[test]
    fn rejects_unknown_names() {
        for bad in ["adamx", "fancy_adam", "lookahead_", "a_b_c", ""] {
            assert!(
                matches!(bad.parse::<OptimizerName>(), Err(EquitrainError::UnknownOptimizer(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_positive_learning_rate() {
        let config = OptimizerConfig::new("adam".parse().unwrap(), 0.0);
        assert!(Optimizer::new(&config, &model()).is_err());
    }

    #[test]
    fn bias_is_excluded_from_weight_decay() {
        let mut config = OptimizerConfig::new("momentum".parse().unwrap(), 0.1);
        config.weight_decay = 1.0;
        config.momentum = 0.0;
        let mut m = model();
        let mut opt = Optimizer::new(&config, &m).unwrap();
        opt.step(m.parameters_mut(), &[0.0, 0.0]);
        assert_eq!(m.params[0], 1.0);
        assert!((m.params[1] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn learning_rate_can_be_changed() {
        let config = OptimizerConfig::new("sgd".parse().unwrap(), 0.1);
        let mut opt = Optimizer::new(&config, &model()).unwrap();
        opt.set_lr(0.05);
        assert_eq!(opt.lr(), 0.05);
        assert_eq!(opt.num_parameters(), 2);
    }

    #[test]
    fn state_survives_serialization() {
        let config = OptimizerConfig::new("lookahead_adam".parse().unwrap(), 0.1);
        let mut m = model();
        let mut opt = Optimizer::new(&config, &m).unwrap();
        opt.step(m.parameters_mut(), &[0.3, -0.2]);

        let json = serde_json::to_string(&opt).unwrap();
        let restored: Optimizer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, opt);
    }
}
