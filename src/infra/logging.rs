// ============================================================
// Layer 6 - Logging
// ============================================================
// Two sinks behind one EnvFilter:
//
//   stdout                         coloured, for the operator
//   {log_dir}/skeleton_<ts>.log    plain text, one file per run
//
// The default filter is `slr_skeleton=info`; RUST_LOG overrides it.
// If the log directory cannot be created the run continues with
// stdout only.
//
// LogObserver turns training events into the human-readable
// progress lines, and `banner` draws the 60-column `#` rules around
// run milestones.

use std::path::Path;

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::domain::metrics::EpochSummary;
use crate::domain::traits::{BatchProgress, Phase, TrainingObserver};

const DEFAULT_FILTER: &str = "slr_skeleton=info";
const BANNER_WIDTH:   usize = 60;

/// Install the global subscriber. Keep the returned guard alive
/// until exit, or buffered file lines are lost.
pub fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (file_layer, guard) = match log_dir.map(open_log_file) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Warning: file logging disabled ({e})");
            (None, None)
        }
        None => (None, None),
    };

    let registered = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if registered.is_err() {
        // a subscriber is already installed (tests, embedding)
        return None;
    }
    guard
}

fn open_log_file(dir: &Path) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create '{}': {e}", dir.display()))?;

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(format!("skeleton_{stamp}"))
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| e.to_string())
}

/// `title` centred in a 60-column rule of `#`
pub fn banner(title: &str) -> String {
    format!("{title:#^width$}", width = BANNER_WIDTH)
}

// ─── LogObserver ──────────────────────────────────────────────────────────────
pub struct LogObserver {
    total_epochs: usize,
}

impl LogObserver {
    pub fn new(total_epochs: usize) -> Self {
        Self { total_epochs }
    }
}

impl TrainingObserver for LogObserver {
    fn on_batch(&mut self, p: &BatchProgress) {
        tracing::info!(
            "epoch {:3}/{} | batch {:5}/{} | samples {:6} | loss {:.6}",
            p.epoch + 1, self.total_epochs, p.batch, p.num_batches, p.samples, p.loss,
        );
    }

    fn on_epoch(&mut self, phase: Phase, s: &EpochSummary) {
        let label = match phase {
            Phase::Train      => "Training",
            Phase::Validation => "Validation",
        };
        tracing::info!(
            "Average {label} Loss of Epoch {}: {:.6} | Acc: {:.2}% ({} samples)",
            s.epoch + 1, s.mean_loss, s.accuracy * 100.0, s.samples,
        );
    }

    fn on_checkpoint(&mut self, epoch: usize, path: &Path) {
        tracing::info!("{}", banner(&format!("Epoch {} Model Saved", epoch + 1)));
        tracing::debug!("checkpoint: {}", path.display());
    }
}
