use std::time::Instant;

use crate::data::loader::DataLoader;
use crate::error::{EquitrainError, Result};
use crate::loss::generic::GenericLoss;
use crate::model::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::Scheduler;
use crate::report::reporter::{NoOpReporter, Reporter};
use crate::train::best::BestMetrics;
use crate::train::checkpoint::{checkpoint_name, CheckpointSink, TrainState};
use crate::train::epoch_stats::EpochStats;
use crate::train::loss_metrics::LossMetrics;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Result of a completed `TrainSession::run`.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub best: BestMetrics,
    pub history: Vec<EpochStats>,
    /// Averages over the test set, when one was given.
    pub test: Option<LossMetrics>,
}

/// One training run: a model, its optimizer and schedule, the loss, and
/// where logs and checkpoints go.
///
/// Every process runs the same computation. Only a session whose
/// `config.main_process` is set logs and writes checkpoints.
pub struct TrainSession<'a> {
    model: &'a mut dyn Model,
    optimizer: Optimizer,
    scheduler: Scheduler,
    loss: GenericLoss,
    config: TrainConfig,
    reporter: &'a dyn Reporter,
    checkpoints: Option<&'a mut dyn CheckpointSink>,
    best: BestMetrics,
}

impl<'a> TrainSession<'a> {
    pub fn new(
        model: &'a mut dyn Model,
        optimizer: Optimizer,
        scheduler: Scheduler,
        loss: GenericLoss,
        config: TrainConfig,
        reporter: &'a dyn Reporter,
    ) -> Self {
        TrainSession {
            model,
            optimizer,
            scheduler,
            loss,
            config,
            reporter,
            checkpoints: None,
            best: BestMetrics::default(),
        }
    }

    pub fn with_checkpoints(mut self, sink: &'a mut dyn CheckpointSink) -> Self {
        self.checkpoints = Some(sink);
        self
    }

    /// Starts from a previously recorded best, e.g. when resuming.
    pub fn with_best(mut self, best: BestMetrics) -> Self {
        self.best = best;
        self
    }

    pub fn best(&self) -> &BestMetrics {
        &self.best
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    fn reporter(&self) -> &'a dyn Reporter {
        if self.config.main_process {
            self.reporter
        } else {
            &NoOpReporter
        }
    }

    /// Trains for `config.epochs` epochs, validating after each one, then
    /// evaluates `test` once if given.
    ///
    /// # Arguments
    /// - `train`: batches used for gradient updates
    /// - `valid`: evaluated after every epoch; drives best-epoch selection
    ///   and the plateau scheduler
    /// - `test` : optional, evaluated once after the last epoch
    ///
    /// # Errors
    /// Fails on an empty training or validation set, or when the model,
    /// loss or checkpoint sink fails.
    pub fn run(
        &mut self,
        train: &mut DataLoader,
        valid: &mut DataLoader,
        test: Option<&mut DataLoader>,
    ) -> Result<TrainOutcome> {
        if train.is_empty() {
            return Err(EquitrainError::Dataset("training set is empty".to_string()));
        }
        if valid.is_empty() {
            return Err(EquitrainError::Dataset("validation set is empty".to_string()));
        }

        let reporter = self.reporter();
        reporter.info(&format!("Number of params: {}", self.model.num_parameters()));

        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            let epoch_start = Instant::now();

            // ── Schedule and train ────────────────────────────────────────
            self.scheduler.step(epoch, &self.best, &mut self.optimizer);
            let lr = self.optimizer.lr();

            let (train_metrics, skipped_batches) = self.train_one_epoch(epoch, train)?;

            // ── Validation and best selection ─────────────────────────────
            let val_metrics = self.evaluate(valid)?;

            let improved = val_metrics.update_best(&mut self.best, epoch);
            if improved && self.config.main_process {
                self.save_checkpoint(epoch, &val_metrics)?;
            }

            // ── Epoch summary ─────────────────────────────────────────────
            let elapsed = epoch_start.elapsed();
            train_metrics.log(reporter, &format!("Epoch [{epoch:>4}] Train -- "), "");
            val_metrics.log(
                reporter,
                &format!("Epoch [{epoch:>4}] Valid -- "),
                &format!(", Time: {:.2}s", elapsed.as_secs_f64()),
            );
            reporter.info(&best_line(&self.best));

            let stats = EpochStats {
                epoch,
                total_epochs: self.config.epochs,
                train_loss: train_metrics.loss(),
                val_loss: val_metrics.loss(),
                val_energy_loss: val_metrics.energy_loss(),
                val_forces_loss: val_metrics.forces_loss(),
                val_stress_loss: val_metrics.stress_loss(),
                skipped_batches,
                lr,
                improved,
                elapsed_ms: elapsed.as_millis() as u64,
            };
            if let Some(tx) = &self.config.progress_tx {
                // A dropped receiver does not stop training.
                let _ = tx.send(stats.clone());
            }
            history.push(stats);
        }

        let test = match test {
            Some(loader) => {
                let metrics = self.evaluate(loader)?;
                metrics.log(reporter, "Test -- ", "");
                Some(metrics)
            }
            None => None,
        };

        Ok(TrainOutcome { best: self.best, history, test })
    }

    /// One pass of gradient updates over `loader`. Returns the training
    /// averages and the number of batches skipped by the edge limit.
    pub fn train_one_epoch(&mut self, epoch: usize, loader: &mut DataLoader) -> Result<(LossMetrics, usize)> {
        let reporter = self.reporter();
        let mut metrics = LossMetrics::new(&self.loss.weights);
        let mut grads = vec![0.0; self.model.num_parameters()];
        let mut skipped = 0;

        let n_steps = loader.len();
        let print_freq = self.config.print_freq.max(1);
        let start = Instant::now();

        for (step, batch) in loader.iter().enumerate() {
            let limit = self.config.batch_edge_limit;
            if limit > 0 && batch.num_edges() > limit {
                reporter.info(&format!(
                    "Batch edge limit violated. Batch has {} edges. Skipping batch...",
                    batch.num_edges()
                ));
                skipped += 1;
                continue;
            }

            let prediction = self.model.forward(&batch, self.loss.outputs())?;
            let record = self.loss.compute(&prediction, &batch)?;
            let d_prediction = self.loss.gradient(&prediction, &batch)?;

            grads.fill(0.0);
            self.model.backward(&d_prediction, &mut grads);
            self.optimizer.step(self.model.parameters_mut(), &grads);

            metrics.update(&record, batch.num_graphs());

            if step % print_freq == 0 || step == n_steps - 1 {
                let ms_per_step = 1e3 * start.elapsed().as_secs_f64() / (step + 1) as f64;
                metrics.log(
                    reporter,
                    &format!("Epoch: [{epoch}][{step}/{n_steps}] "),
                    &format!(", time/step={ms_per_step:.0}ms, lr={}", format_lr(self.optimizer.lr())),
                );
            }
        }

        Ok((metrics, skipped))
    }

    /// Averages the loss over `loader` without touching the parameters.
    pub fn evaluate(&mut self, loader: &mut DataLoader) -> Result<LossMetrics> {
        let mut metrics = LossMetrics::new(&self.loss.weights);
        for batch in loader.iter() {
            let prediction = self.model.forward(&batch, self.loss.outputs())?;
            let record = self.loss.compute(&prediction, &batch)?;
            metrics.update(&record, batch.num_graphs());
        }
        Ok(metrics)
    }

    fn save_checkpoint(&mut self, epoch: usize, val_metrics: &LossMetrics) -> Result<()> {
        let Some(sink) = self.checkpoints.as_mut() else {
            return Ok(());
        };
        let name = checkpoint_name(epoch, val_metrics.energy_loss(), val_metrics.forces_loss());
        let state = TrainState {
            model: &*self.model,
            optimizer: &self.optimizer,
            scheduler: &self.scheduler,
            best: &self.best,
        };
        sink.save(&name, &state)
    }
}

// ---------------------------------------------------------------------------
// Log formatting
// ---------------------------------------------------------------------------

/// `Best -- val_epoch=<e>, loss: T[, loss_e: E][, loss_f: F][, loss_s: S]`
fn best_line(best: &BestMetrics) -> String {
    let mut line = format!("Best -- val_epoch={}, loss: {:.5}", best.epoch, best.loss);
    for (tag, value) in [("e", best.energy_loss), ("f", best.forces_loss), ("s", best.stress_loss)] {
        if let Some(v) = value {
            line.push_str(&format!(", loss_{tag}: {v:.5}"));
        }
    }
    line
}

/// Two-digit scientific notation with a signed two-digit exponent, e.g.
/// `1.00e-02`.
fn format_lr(lr: f64) -> String {
    let formatted = format!("{lr:.2e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => formatted,
        },
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lr_is_printed_like_printf() {
        assert_eq!(format_lr(0.01), "1.00e-02");
        assert_eq!(format_lr(0.75), "7.50e-01");
        assert_eq!(format_lr(12.5), "1.25e+01");
        assert_eq!(format_lr(1e-10), "1.00e-10");
    }

    #[test]
    fn best_line_skips_absent_objectives() {
        let best = BestMetrics {
            loss: 0.3,
            energy_loss: Some(0.1),
            forces_loss: Some(0.2),
            stress_loss: None,
            epoch: 4,
        };
        assert_eq!(best_line(&best), "Best -- val_epoch=4, loss: 0.30000, loss_e: 0.10000, loss_f: 0.20000");
    }
}
