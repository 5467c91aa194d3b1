// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics for a run in two files:
//
//   {run_dir}/metrics.csv     one row per epoch
//     epoch,train_loss,train_acc,val_loss,val_acc
//     1,4.601234,0.012000,4.598812,0.010000
//
//   {run_dir}/scalars.jsonl   one JSON object per scalar
//     {"tag":"Loss/train","step":1,"value":4.601234,"wall_time":1760870400.512}
//
// Scalar tags and their step counters:
//   Loss/train_batch                    global batch counter
//   Loss/train      Accuracy/train      epoch number (1, 2, 3, ...)
//   Loss/val        Accuracy/val        epoch number
//
// The logger is a TrainingObserver. Scalars are written as the
// summaries arrive; the CSV row waits for the epoch's checkpoint, so
// a row exists only for epochs whose weights are on disk. A failed
// write is logged as a warning and the run continues.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::metrics::EpochSummary;
use crate::domain::traits::{BatchProgress, Phase, TrainingObserver};

const CSV_HEADER: &str = "epoch,train_loss,train_acc,val_loss,val_acc";

/// One point of a scalar time series
#[derive(Debug, Serialize)]
struct ScalarRecord<'a> {
    tag:       &'a str,
    step:      usize,
    value:     f64,
    /// Seconds since the Unix epoch
    wall_time: f64,
}

pub struct MetricsLogger {
    csv_path:     PathBuf,
    scalars_path: PathBuf,
    /// Summaries of the current epoch, waiting for its checkpoint
    train:        Option<EpochSummary>,
    val:          Option<EpochSummary>,
}

impl MetricsLogger {
    /// Create `dir` and the CSV header if needed. Appends to an
    /// existing run directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self {
            csv_path,
            scalars_path: dir.join("scalars.jsonl"),
            train:        None,
            val:          None,
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn scalars_path(&self) -> &Path {
        &self.scalars_path
    }

    fn scalar(&self, tag: &str, step: usize, value: f64) -> Result<()> {
        let record = ScalarRecord {
            tag,
            step,
            value,
            wall_time: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        append_line(&self.scalars_path, &serde_json::to_string(&record)?)
    }

    fn epoch_scalars(&self, phase: Phase, s: &EpochSummary) -> Result<()> {
        let step = s.epoch + 1;
        self.scalar(&format!("Loss/{phase}"), step, s.mean_loss)?;
        self.scalar(&format!("Accuracy/{phase}"), step, s.accuracy)
    }

    fn csv_row(&self, train: &EpochSummary, val: &EpochSummary) -> Result<()> {
        append_line(
            &self.csv_path,
            &format!(
                "{},{:.6},{:.6},{:.6},{:.6}",
                train.epoch + 1,
                train.mean_loss,
                train.accuracy,
                val.mean_loss,
                val.accuracy,
            ),
        )
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}

impl TrainingObserver for MetricsLogger {
    fn on_batch(&mut self, progress: &BatchProgress) {
        if let Err(e) = self.scalar("Loss/train_batch", progress.global_step, progress.loss) {
            tracing::warn!("Cannot record batch loss: {e:#}");
        }
    }

    fn on_epoch(&mut self, phase: Phase, summary: &EpochSummary) {
        if let Err(e) = self.epoch_scalars(phase, summary) {
            tracing::warn!("Cannot record {phase} scalars: {e:#}");
        }

        match phase {
            Phase::Train      => self.train = Some(*summary),
            Phase::Validation => self.val = Some(*summary),
        }
    }

    fn on_checkpoint(&mut self, epoch: usize, _path: &Path) {
        let (Some(train), Some(val)) = (self.train.take(), self.val.take()) else {
            tracing::warn!("Epoch {} checkpointed without both summaries; no CSV row", epoch + 1);
            return;
        };
        if let Err(e) = self.csv_row(&train, &val) {
            tracing::warn!("Cannot append to '{}': {e:#}", self.csv_path.display());
        }
    }
}
