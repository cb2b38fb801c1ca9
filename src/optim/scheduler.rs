use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EquitrainError, Result};
use crate::optim::optimizer::Optimizer;
use crate::train::best::BestMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Plateau,
    Step,
    Cosine,
    Fixed,
}

impl FromStr for SchedulerKind {
    type Err = EquitrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plateau" => Ok(SchedulerKind::Plateau),
            "step"    => Ok(SchedulerKind::Step),
            "cosine"  => Ok(SchedulerKind::Cosine),
            "fixed"   => Ok(SchedulerKind::Fixed),
            _ => Err(EquitrainError::UnknownScheduler(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateauMode {
    Min,
    Max,
}

impl FromStr for PlateauMode {
    type Err = EquitrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(PlateauMode::Min),
            "max" => Ok(PlateauMode::Max),
            _ => Err(EquitrainError::InvalidArgument {
                name: "plateau-mode",
                reason: format!("expected `min` or `max`, got `{s}`"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub kind: SchedulerKind,
    pub epochs: usize,
    pub min_lr: f64,
    pub decay_rate: f64,
    pub decay_epochs: usize,
    pub plateau_patience: usize,
    pub plateau_factor: f64,
    pub plateau_threshold: f64,
    pub plateau_mode: PlateauMode,
}

impl SchedulerConfig {
    pub fn new(kind: SchedulerKind, epochs: usize) -> Self {
        SchedulerConfig {
            kind,
            epochs,
            min_lr: 0.0,
            decay_rate: 0.5,
            decay_epochs: 30,
            plateau_patience: 2,
            plateau_factor: 0.5,
            plateau_threshold: 1e-4,
            plateau_mode: PlateauMode::Min,
        }
    }
}

/// Per-epoch learning-rate schedule. `step` is called once at the start of
/// every epoch and writes the new rate into the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    config: SchedulerConfig,
    base_lr: f64,
    monitor_best: Option<f64>,
    bad_epochs: usize,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, optimizer: &Optimizer) -> Result<Scheduler> {
        if config.decay_epochs == 0 {
            return Err(EquitrainError::InvalidArgument {
                name: "decay-epochs",
                reason: "must be positive".to_string(),
            });
        }
        if !(config.plateau_factor > 0.0 && config.plateau_factor < 1.0) {
            return Err(EquitrainError::InvalidArgument {
                name: "plateau-factor",
                reason: format!("must lie in (0, 1), got {}", config.plateau_factor),
            });
        }
        Ok(Scheduler { config, base_lr: optimizer.lr(), monitor_best: None, bad_epochs: 0 })
    }

    pub fn kind(&self) -> SchedulerKind {
        self.config.kind
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Takes the progress of `saved` (base rate, plateau bookkeeping) and
    /// keeps this scheduler's own configuration.
    pub fn restore_state(&mut self, saved: Scheduler) {
        self.base_lr = saved.base_lr;
        self.monitor_best = saved.monitor_best;
        self.bad_epochs = saved.bad_epochs;
    }

    pub fn step(&mut self, epoch: usize, best: &BestMetrics, optimizer: &mut Optimizer) {
        let lr = match self.config.kind {
            SchedulerKind::Fixed => return,
            SchedulerKind::Plateau => self.plateau(best.loss, optimizer.lr()),
            SchedulerKind::Step => {
                let exponent = (epoch / self.config.decay_epochs) as i32;
                self.base_lr * self.config.decay_rate.powi(exponent)
            }
            SchedulerKind::Cosine => {
                let t = epoch as f64 / self.config.epochs.max(1) as f64;
                let min_lr = self.config.min_lr;
                min_lr + 0.5 * (self.base_lr - min_lr) * (1.0 + (PI * t.min(1.0)).cos())
            }
        };
        optimizer.set_lr(lr.max(self.config.min_lr));
    }

    fn plateau(&mut self, metric: f64, lr: f64) -> f64 {
        // Nothing to compare against until a validation pass has finished.
        if !metric.is_finite() {
            return lr;
        }

        let threshold = self.config.plateau_threshold;
        let improved = match (self.monitor_best, self.config.plateau_mode) {
            (None, _) => true,
            (Some(best), PlateauMode::Min) => metric < best * (1.0 - threshold),
            (Some(best), PlateauMode::Max) => metric > best * (1.0 + threshold),
        };

        if improved {
            self.monitor_best = Some(metric);
            self.bad_epochs = 0;
            return lr;
        }

        self.bad_epochs += 1;
        if self.bad_epochs > self.config.plateau_patience {
            self.bad_epochs = 0;
            return lr * self.config.plateau_factor;
        }
        lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::graph::GraphBatch;
    use crate::model::model::{Model, Outputs, Prediction, PredictionGrad};
    use crate::optim::optimizer::OptimizerConfig;

    struct One(Vec<f64>);

    impl Model for One {
        fn forward(&mut self, _: &GraphBatch, _: Outputs) -> Result<Prediction> {
            Ok(Prediction::default())
        }
        fn backward(&mut self, _: &PredictionGrad, _: &mut [f64]) {}
        fn parameters(&self) -> &[f64] {
            &self.0
        }
        fn parameters_mut(&mut self) -> &mut [f64] {
            &mut self.0
        }
        fn parameter_names(&self) -> Vec<String> {
            vec!["w".to_string()]
        }
    }

    fn optimizer(lr: f64) -> Optimizer {
        Optimizer::new(&OptimizerConfig::new("adam".parse().unwrap(), lr), &One(vec![0.0])).unwrap()
    }

    fn best(loss: f64) -> BestMetrics {
        BestMetrics { loss, ..BestMetrics::default() }
    }

    #[test]
    fn parses_names() {
        assert_eq!("Plateau".parse::<SchedulerKind>().unwrap(), SchedulerKind::Plateau);
        assert!(matches!(
            "warmup".parse::<SchedulerKind>(),
            Err(EquitrainError::UnknownScheduler(_))
        ));
        assert!("sideways".parse::<PlateauMode>().is_err());
    }

    #[test]
    fn plateau_reduces_after_patience() {
        let mut opt = optimizer(1.0);
        let mut config = SchedulerConfig::new(SchedulerKind::Plateau, 10);
        config.plateau_patience = 1;
        let mut sched = Scheduler::new(config, &opt).unwrap();

        sched.step(0, &best(f64::INFINITY), &mut opt);
        assert_eq!(opt.lr(), 1.0);
        sched.step(1, &best(0.5), &mut opt);
        sched.step(2, &best(0.5), &mut opt);
        assert_eq!(opt.lr(), 1.0);
        sched.step(3, &best(0.5), &mut opt);
        assert_eq!(opt.lr(), 0.5);
        sched.step(4, &best(0.1), &mut opt);
        assert_eq!(opt.lr(), 0.5);
    }

    #[test]
    fn plateau_respects_min_lr() {
        let mut opt = optimizer(1.0);
        let mut config = SchedulerConfig::new(SchedulerKind::Plateau, 10);
        config.plateau_patience = 0;
        config.min_lr = 0.8;
        let mut sched = Scheduler::new(config, &opt).unwrap();
        sched.step(0, &best(1.0), &mut opt);
        sched.step(1, &best(1.0), &mut opt);
        assert_eq!(opt.lr(), 0.8);
    }

    #[test]
    fn step_decay() {
        let mut opt = optimizer(1.0);
        let mut config = SchedulerConfig::new(SchedulerKind::Step, 10);
        config.decay_epochs = 2;
        config.decay_rate = 0.1;
        let mut sched = Scheduler::new(config, &opt).unwrap();
        sched.step(1, &best(f64::INFINITY), &mut opt);
        assert_eq!(opt.lr(), 1.0);
        sched.step(4, &best(f64::INFINITY), &mut opt);
        assert!((opt.lr() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn cosine_ends_at_min_lr() {
        let mut opt = optimizer(1.0);
        let mut config = SchedulerConfig::new(SchedulerKind::Cosine, 4);
        config.min_lr = 0.1;
        let mut sched = Scheduler::new(config, &opt).unwrap();
        sched.step(0, &best(f64::INFINITY), &mut opt);
        assert!((opt.lr() - 1.0).abs() < 1e-12);
        sched.step(2, &best(f64::INFINITY), &mut opt);
        assert!((opt.lr() - 0.55).abs() < 1e-12);
        sched.step(4, &best(f64::INFINITY), &mut opt);
        assert!((opt.lr() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn fixed_leaves_lr_alone() {
        let mut opt = optimizer(0.3);
        let mut sched = Scheduler::new(SchedulerConfig::new(SchedulerKind::Fixed, 3), &opt).unwrap();
        sched.step(2, &best(0.0), &mut opt);
        assert_eq!(opt.lr(), 0.3);
    }
}
