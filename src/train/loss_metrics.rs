use crate::loss::weighted::{LossRecord, LossWeights};
use crate::report::reporter::Reporter;
use crate::train::best::{BestMetrics, Candidate};
use crate::train::meter::AverageMeter;

/// Running averages of the total loss and of every active objective over
/// one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LossMetrics {
    pub total: AverageMeter,
    pub energy: Option<AverageMeter>,
    pub forces: Option<AverageMeter>,
    pub stress: Option<AverageMeter>,
}

impl LossMetrics {
    pub fn new(weights: &LossWeights) -> Self {
        let meter = |active: bool| active.then(AverageMeter::new);
        LossMetrics {
            total: AverageMeter::new(),
            energy: meter(weights.energy_active()),
            forces: meter(weights.forces_active()),
            stress: meter(weights.stress_active()),
        }
    }

    /// Feeds one batch. Values for objectives without a meter are dropped.
    pub fn update(&mut self, record: &LossRecord, batch_size: usize) {
        self.total.update(record.total, batch_size);
        feed(&mut self.energy, record.energy, batch_size);
        feed(&mut self.forces, record.forces, batch_size);
        feed(&mut self.stress, record.stress, batch_size);
    }

    pub fn reset(&mut self) {
        self.total.reset();
        for meter in [&mut self.energy, &mut self.forces, &mut self.stress].into_iter().flatten() {
            meter.reset();
        }
    }

    /// Number of graphs seen so far.
    pub fn count(&self) -> usize {
        self.total.count
    }

    pub fn loss(&self) -> f64 {
        self.total.avg
    }

    pub fn energy_loss(&self) -> Option<f64> {
        self.energy.map(|m| m.avg)
    }

    pub fn forces_loss(&self) -> Option<f64> {
        self.forces.map(|m| m.avg)
    }

    pub fn stress_loss(&self) -> Option<f64> {
        self.stress.map(|m| m.avg)
    }

    /// `<prefix>loss: T[, loss_e: E][, loss_f: F][, loss_s: S]<postfix>`
    pub fn line(&self, prefix: &str, postfix: &str) -> String {
        let mut line = format!("{prefix}loss: {:.5}", self.loss());
        for (tag, value) in [("e", self.energy_loss()), ("f", self.forces_loss()), ("s", self.stress_loss())] {
            if let Some(v) = value {
                line.push_str(&format!(", loss_{tag}: {v:.5}"));
            }
        }
        line.push_str(postfix);
        line
    }

    pub fn log(&self, reporter: &dyn Reporter, prefix: &str, postfix: &str) {
        reporter.info(&self.line(prefix, postfix));
    }

    pub fn update_best(&self, best: &mut BestMetrics, epoch: usize) -> bool {
        let candidate = Candidate {
            loss: self.loss(),
            energy_loss: self.energy_loss(),
            forces_loss: self.forces_loss(),
            stress_loss: self.stress_loss(),
        };
        best.update(candidate, epoch)
    }
}

fn feed(meter: &mut Option<AverageMeter>, value: Option<f64>, n: usize) {
    if let (Some(meter), Some(v)) = (meter, value) {
        meter.update(v, n);
    }
}
