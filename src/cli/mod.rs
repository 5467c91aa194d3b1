// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
//   1. `train`    - run the epoch loop and write checkpoints
//   2. `evaluate` - score a checkpoint on the validation split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "slr-skeleton",
    version,
    about = "Train an LSTM/GRU sign-language classifier on skeleton joint sequences."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Where the run's log file goes, if anywhere
    pub fn log_dir(&self) -> Option<PathBuf> {
        match &self.command {
            Commands::Train(a)    => Some(PathBuf::from(&a.log_dir)),
            Commands::Evaluate(a) => a.log_dir.as_ref().map(PathBuf::from),
        }
    }

    /// Dispatch to the matching use case. Only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(args.into());
    if let Some(path) = use_case.stop_flag().sentinel() {
        tracing::info!("Create '{}' to stop after the current batch", path.display());
    }
    let reports = use_case.execute()?;

    if let Some(last) = reports.last() {
        println!(
            "Training complete: {} epochs, final val_acc={:.2}%, last checkpoint {}",
            reports.len(),
            last.val.accuracy * 100.0,
            last.checkpoint.display(),
        );
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let out = EvaluateUseCase::new(args.model_dir, args.epoch, args.data_path).execute()?;
    println!(
        "{}: val_loss={:.6} val_acc={:.2}% ({} samples)",
        out.checkpoint.display(),
        out.summary.mean_loss,
        out.summary.accuracy * 100.0,
        out.summary.samples,
    );
    Ok(())
}
