// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// SkeletonSource
//   Anything that can produce the samples of one dataset split.
//     - DirectorySource  → per-class folders of joint text files
//     - SyntheticSource  → generated trajectories for smoke runs
//
// TrainingObserver
//   Receives progress events from the epoch runners and the
//   orchestrator. Observers only record; they never touch model
//   state or running metrics, and their own failures are their
//   business (log and carry on).
//     - LogObserver    → human-readable log lines
//     - MetricsLogger  → CSV + scalar time series on disk

use anyhow::Result;
use std::fmt;
use std::path::Path;

use crate::domain::metrics::EpochSummary;
use crate::domain::sample::SkeletonSample;

// ─── Split ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn is_train(self) -> bool {
        matches!(self, Split::Train)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train      => "training",
            Split::Validation => "validation",
        }
    }
}

// ─── SkeletonSource ───────────────────────────────────────────────────────────
/// Produces the samples of one split. The same source must return
/// disjoint, deterministic partitions for Train and Validation.
pub trait SkeletonSource {
    fn load(&self, split: Split) -> Result<Vec<SkeletonSample>>;

    /// Values per frame of every sample this source yields
    fn feature_dim(&self) -> usize;
}

// ─── Observer events ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Validation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train      => write!(f, "train"),
            Phase::Validation => write!(f, "val"),
        }
    }
}

/// Periodic training progress (every log_interval batches and the last one)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    /// Zero-based epoch index
    pub epoch:       usize,
    /// One-based batch index within the epoch
    pub batch:       usize,
    pub num_batches: usize,
    /// Samples processed so far in this epoch
    pub samples:     usize,
    /// Loss of this batch alone
    pub loss:        f64,
    /// Monotonic batch counter across the whole run
    pub global_step: usize,
}

/// A non-finite loss value observed during training
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericFault {
    pub epoch:   usize,
    pub batch:   usize,
    pub loss:    f64,
    /// True when the optimizer step was skipped for this batch
    pub skipped: bool,
}

pub trait TrainingObserver {
    fn on_batch(&mut self, _progress: &BatchProgress) {}

    fn on_epoch(&mut self, _phase: Phase, _summary: &EpochSummary) {}

    fn on_numeric_fault(&mut self, _fault: &NumericFault) {}

    fn on_checkpoint(&mut self, _epoch: usize, _path: &Path) {}
}

/// Fans every event out to a list of observers, in order.
#[derive(Default)]
pub struct Observers {
    inner: Vec<Box<dyn TrainingObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl TrainingObserver + 'static) -> Self {
        self.inner.push(Box::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl TrainingObserver for Observers {
    fn on_batch(&mut self, progress: &BatchProgress) {
        self.inner.iter_mut().for_each(|o| o.on_batch(progress));
    }

    fn on_epoch(&mut self, phase: Phase, summary: &EpochSummary) {
        self.inner.iter_mut().for_each(|o| o.on_epoch(phase, summary));
    }

    fn on_numeric_fault(&mut self, fault: &NumericFault) {
        self.inner.iter_mut().for_each(|o| o.on_numeric_fault(fault));
    }

    fn on_checkpoint(&mut self, epoch: usize, path: &Path) {
        self.inner.iter_mut().for_each(|o| o.on_checkpoint(epoch, path));
    }
}
