use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use equitrain::cli::{PredictArgs, PreprocessArgs, TrainArgs};

/// equitrain: training harness for machine-learned interatomic potentials.
#[derive(Parser)]
#[command(name = "equitrain", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build graph datasets and statistics.json from structure files.
    Preprocess(PreprocessArgs),
    /// Train a model on preprocessed graphs.
    Train(TrainArgs),
    /// Predict energy, forces and stress with a saved model.
    Predict(PredictArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Preprocess(args) => {
            let summary = equitrain::preprocess(&args).context("preprocessing failed")?;
            tracing::info!(
                train = summary.train,
                valid = summary.valid,
                test = summary.test.unwrap_or(0),
                "preprocessing done"
            );
        }
        Command::Train(args) => {
            if let Some(outcome) = equitrain::train(&args).context("training failed")? {
                tracing::info!(
                    best_epoch = outcome.best.epoch,
                    best_loss = outcome.best.loss,
                    "training done"
                );
            }
        }
        Command::Predict(args) => {
            let predictions = equitrain::predict(&args).context("prediction failed")?;
            if args.output_file.is_none() {
                println!("{}", serde_json::to_string_pretty(&predictions)?);
            }
        }
    }

    Ok(())
}
