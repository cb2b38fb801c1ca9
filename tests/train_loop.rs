mod common;

use std::sync::mpsc;

use common::{chain, dataset, ConstantEnergy};
use equitrain::data::DataLoader;
use equitrain::optim::{Optimizer, OptimizerConfig, Scheduler, SchedulerConfig, SchedulerKind};
use equitrain::report::MemoryReporter;
use equitrain::train::{CheckpointSink, TrainConfig, TrainSession, TrainState};
use equitrain::{EquitrainError, GenericLoss, LossWeights, Result};

#[derive(Default)]
struct RecordingSink {
    names: Vec<String>,
}

impl CheckpointSink for RecordingSink {
    fn save(&mut self, name: &str, state: &TrainState<'_>) -> Result<()> {
        assert!(state.best.loss.is_finite());
        self.names.push(name.to_string());
        Ok(())
    }
}

fn sgd(model: &ConstantEnergy, lr: f64) -> (Optimizer, Scheduler) {
    let mut config = OptimizerConfig::new("momentum".parse().unwrap(), lr);
    config.momentum = 0.0;
    let optimizer = Optimizer::new(&config, model).unwrap();
    let scheduler = Scheduler::new(SchedulerConfig::new(SchedulerKind::Fixed, 2), &optimizer).unwrap();
    (optimizer, scheduler)
}

/// Four two-atom graphs with reference energy 1 and zero forces.
fn loader(batch_size: usize) -> DataLoader {
    DataLoader::new(dataset(vec![chain(2, 1.0); 4]), batch_size)
}

#[test]
fn best_epoch_is_the_one_with_lower_validation_loss() {
    let weights = LossWeights::new(1.0, 1.0, 0.0);
    let mut model = ConstantEnergy::new(0.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();
    let mut sink = RecordingSink::default();

    let mut session = TrainSession::new(
        &mut model,
        optimizer,
        scheduler,
        GenericLoss::new(weights),
        TrainConfig::new(2),
        &reporter,
    )
    .with_checkpoints(&mut sink);
    let outcome = session.run(&mut loader(2), &mut loader(2), None).unwrap();

    // Each step moves the energy 0.25 towards the target: validation loss is
    // 0.5 after epoch 0 and 0 after epoch 1.
    assert_eq!(model.params, vec![1.0]);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(outcome.history[0].val_loss, 0.5);
    assert_eq!(outcome.history[1].val_loss, 0.0);
    assert_eq!(outcome.best.epoch, 1);
    assert_eq!(outcome.best.loss, 0.0);
    assert_eq!(outcome.best.energy_loss, Some(0.0));
    assert_eq!(outcome.best.forces_loss, Some(0.0));
    assert_eq!(outcome.best.stress_loss, None);
    assert!(outcome.test.is_none());

    assert_eq!(
        sink.names,
        vec!["best_val_epochs@0_e@0.5000_f@0.0000", "best_val_epochs@1_e@0.0000_f@0.0000"]
    );

    let lines = reporter.lines();
    assert_eq!(lines[0], "Number of params: 1");
    let first_step = lines.iter().find(|l| l.starts_with("Epoch: [0][0/2] ")).unwrap();
    assert!(first_step.starts_with("Epoch: [0][0/2] loss: 1.00000, loss_e: 1.00000, loss_f: 0.00000, time/step="));
    assert!(first_step.ends_with("ms, lr=2.50e-01"));
    assert!(lines.iter().any(|l| l.starts_with("Epoch: [1][1/2] loss: 0.37500")));
    assert_eq!(lines.last().unwrap(), "Best -- val_epoch=1, loss: 0.00000, loss_e: 0.00000, loss_f: 0.00000");
    assert!(lines.iter().all(|l| !l.contains("loss_s")));
}

#[test]
fn equal_validation_loss_keeps_the_earlier_epoch() {
    let weights = LossWeights::new(1.0, 1.0, 0.0);
    let mut model = ConstantEnergy::frozen(0.5);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();
    let mut sink = RecordingSink::default();

    let mut session = TrainSession::new(
        &mut model,
        optimizer,
        scheduler,
        GenericLoss::new(weights),
        TrainConfig::new(2),
        &reporter,
    )
    .with_checkpoints(&mut sink);
    let outcome = session.run(&mut loader(2), &mut loader(2), None).unwrap();

    assert_eq!(outcome.best.epoch, 0);
    assert_eq!(outcome.best.stress_loss, None);
    assert!(outcome.history[0].improved);
    assert!(!outcome.history[1].improved);
    assert_eq!(sink.names, vec!["best_val_epochs@0_e@0.5000_f@0.0000"]);
}

#[test]
fn oversized_batches_are_skipped_and_logged() {
    let weights = LossWeights::new(1.0, 0.0, 0.0);
    let mut model = ConstantEnergy::new(0.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();

    let mut config = TrainConfig::new(1);
    config.batch_edge_limit = 4;
    let mut session = TrainSession::new(&mut model, optimizer, scheduler, GenericLoss::new(weights), config, &reporter);

    let mut train = DataLoader::new(dataset(vec![chain(2, 1.0), chain(5, 1.0), chain(2, 1.0)]), 1);
    let (metrics, skipped) = session.train_one_epoch(0, &mut train).unwrap();

    assert_eq!(skipped, 1);
    assert_eq!(metrics.count(), 2);
    assert!(metrics.forces.is_none());
    assert_eq!(model.forward_calls, 2);
    assert_eq!(model.params, vec![0.5]);
    assert!(reporter
        .lines()
        .contains(&"Batch edge limit violated. Batch has 8 edges. Skipping batch...".to_string()));
}

#[test]
fn only_the_main_process_logs_and_checkpoints() {
    let weights = LossWeights::new(1.0, 1.0, 0.0);
    let mut model = ConstantEnergy::new(0.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();
    let mut sink = RecordingSink::default();

    let mut config = TrainConfig::new(2);
    config.main_process = false;
    let mut session = TrainSession::new(&mut model, optimizer, scheduler, GenericLoss::new(weights), config, &reporter)
        .with_checkpoints(&mut sink);
    let outcome = session.run(&mut loader(2), &mut loader(2), Some(&mut loader(4))).unwrap();

    assert_eq!(outcome.best.epoch, 1);
    assert!(outcome.test.is_some());
    assert!(reporter.lines().is_empty());
    assert!(sink.names.is_empty());
}

#[test]
fn progress_channel_and_test_pass() {
    let weights = LossWeights::new(1.0, 0.0, 0.0);
    let mut model = ConstantEnergy::frozen(0.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();
    let (tx, rx) = mpsc::channel();

    let mut config = TrainConfig::new(3);
    config.progress_tx = Some(tx);
    let mut session = TrainSession::new(&mut model, optimizer, scheduler, GenericLoss::new(weights), config, &reporter);
    let outcome = session.run(&mut loader(3), &mut loader(3), Some(&mut loader(1))).unwrap();
    drop(session);

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received, outcome.history);
    assert_eq!(received.iter().map(|s| s.epoch).collect::<Vec<_>>(), vec![0, 1, 2]);

    let test = outcome.test.unwrap();
    assert_eq!(test.count(), 4);
    assert_eq!(reporter.lines().last().unwrap(), "Test -- loss: 1.00000, loss_e: 1.00000");
}

#[test]
fn empty_validation_set_is_rejected() {
    let weights = LossWeights::default();
    let mut model = ConstantEnergy::new(0.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();
    let mut session = TrainSession::new(
        &mut model,
        optimizer,
        scheduler,
        GenericLoss::new(weights),
        TrainConfig::new(1),
        &reporter,
    );

    let mut empty = DataLoader::new(dataset(Vec::new()), 2);
    let err = session.run(&mut loader(2), &mut empty, None).unwrap_err();
    assert!(matches!(err, EquitrainError::Dataset(_)));
}

#[test]
fn tracked_objectives_follow_the_loss_weights() {
    let weights = LossWeights::new(1.0, 1.0, 1.0);
    let mut model = ConstantEnergy::frozen(1.0);
    let (optimizer, scheduler) = sgd(&model, 0.25);
    let reporter = MemoryReporter::new();

    let mut session =
        TrainSession::new(&mut model, optimizer, scheduler, GenericLoss::new(weights), TrainConfig::new(1), &reporter);
    let outcome = session.run(&mut loader(2), &mut loader(2), None).unwrap();

    assert_eq!(outcome.best.energy_loss, Some(0.0));
    assert_eq!(outcome.best.forces_loss, Some(0.0));
    assert_eq!(outcome.best.stress_loss, Some(0.0));
    assert_eq!(
        reporter.lines().last().unwrap(),
        "Best -- val_epoch=0, loss: 0.00000, loss_e: 0.00000, loss_f: 0.00000, loss_s: 0.00000"
    );
}
