use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use equitrain::cli::{PredictArgs, PreprocessArgs, TrainArgs};
use equitrain::predict::StructurePrediction;
use equitrain::preprocess::{STATISTICS_FILE, TRAIN_FILE, VALID_FILE};
use equitrain::train::checkpoint::{checkpoint_name, BEST_FILE, MODEL_FILE, OPTIMIZER_FILE, SCHEDULER_FILE};
use equitrain::{predict, preprocess, train, BestMetrics};

/// Eight H2 dimers on a harmonic curve around 0.8 Å.
fn write_dimers(path: &Path) {
    let mut text = String::new();
    for i in 0..8 {
        let d = 0.6 + 0.1 * i as f64;
        let energy = -1.0 + (d - 0.8) * (d - 0.8);
        let f = -2.0 * (d - 0.8);
        writeln!(text, "2").unwrap();
        writeln!(text, "Properties=species:S:1:pos:R:3:forces:R:3 energy={energy}").unwrap();
        writeln!(text, "H 0.0 0.0 0.0 {} 0.0 0.0", -f).unwrap();
        writeln!(text, "H {d} 0.0 0.0 {f} 0.0 0.0").unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn preprocess_train_resume_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let xyz = dir.path().join("dimers.xyz");
    write_dimers(&xyz);
    let data_dir = dir.path().join("data");
    let run_dir = dir.path().join("run");

    let mut pre = PreprocessArgs::default();
    pre.files.train_file = Some(xyz.clone());
    pre.files.output_dir = Some(data_dir.clone());
    pre.valid_fraction = 0.25;
    pre.r_max = 3.0;
    let summary = preprocess(&pre).unwrap();
    assert_eq!((summary.train, summary.valid, summary.test), (6, 2, None));
    assert_eq!(summary.statistics.atomic_numbers, vec![1]);
    for file in [TRAIN_FILE, VALID_FILE, STATISTICS_FILE, "debug.log"] {
        assert!(data_dir.join(file).is_file(), "{file} missing");
    }

    let mut args = TrainArgs::default();
    args.files.train_file = Some(data_dir.join(TRAIN_FILE));
    args.files.valid_file = Some(data_dir.join(VALID_FILE));
    args.files.output_dir = Some(run_dir.clone());
    args.statistics_file = Some(data_dir.join(STATISTICS_FILE));
    args.epochs = 2;
    args.print_freq = 1;
    args.data.batch_size = 2;
    args.data.workers = 1;
    args.model.n_basis = 4;
    args.optimizer.opt = "adam".to_string();
    let outcome = train(&args).unwrap().unwrap();

    assert_eq!(outcome.history.len(), 2);
    assert!(outcome.history[0].improved);
    let best = outcome.best;
    assert!(best.loss.is_finite());
    assert!(best.stress_loss.is_none());

    let best_dir = run_dir.join(checkpoint_name(best.epoch, best.energy_loss, best.forces_loss));
    for file in [MODEL_FILE, OPTIMIZER_FILE, SCHEDULER_FILE, BEST_FILE] {
        assert!(best_dir.join(file).is_file(), "{file} missing");
    }
    let saved: BestMetrics = serde_json::from_str(&fs::read_to_string(best_dir.join(BEST_FILE)).unwrap()).unwrap();
    assert_eq!(saved, best);

    let log = fs::read_to_string(run_dir.join("debug.log")).unwrap();
    assert!(log.contains("Number of params: "));
    assert!(log.contains("Best -- val_epoch="));

    // Resuming carries the best metrics over, so they can only improve.
    let mut resume = args.clone();
    resume.epochs = 1;
    resume.files.output_dir = Some(dir.path().join("resumed"));
    resume.model.load_checkpoint = Some(best_dir.clone());
    let resumed = train(&resume).unwrap().unwrap();
    assert!(resumed.best.loss <= best.loss);

    let output = dir.path().join("predictions.json");
    let predict_args = PredictArgs {
        input_file: Some(xyz),
        output_file: Some(output.clone()),
        load_checkpoint_model: Some(best_dir),
        batch_size: 3,
    };
    let predictions = predict(&predict_args).unwrap();
    assert_eq!(predictions.len(), 8);
    assert!(predictions.iter().all(|p| p.energy.is_finite() && p.forces.len() == 2));

    let written: Vec<StructurePrediction> = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, predictions);
}

#[test]
fn compute_stats_stops_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let xyz = dir.path().join("dimers.xyz");
    write_dimers(&xyz);
    let data_dir = dir.path().join("data");

    let mut pre = PreprocessArgs::default();
    pre.files.train_file = Some(xyz);
    pre.files.output_dir = Some(data_dir.clone());
    pre.valid_fraction = 0.25;
    pre.r_max = 3.0;
    preprocess(&pre).unwrap();

    let mut args = TrainArgs::default();
    args.files.train_file = Some(data_dir.join(TRAIN_FILE));
    args.files.valid_file = Some(data_dir.join(VALID_FILE));
    args.files.output_dir = Some(dir.path().join("run"));
    args.statistics_file = Some(data_dir.join(STATISTICS_FILE));
    args.compute_stats = true;
    assert!(train(&args).unwrap().is_none());
    assert!(!dir.path().join("run").read_dir().unwrap().any(|e| {
        e.unwrap().file_name().to_string_lossy().starts_with("best_val_epochs@")
    }));
}
