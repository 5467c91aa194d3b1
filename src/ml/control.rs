// ============================================================
// Layer 5 - Run Control
// ============================================================
// Small pieces of shared state the epoch loop consults between
// batches:
//
//   StopFlag         - external stop request, checked before each
//                      batch fetch (the only interruption point).
//                      Set from another thread, or by creating the
//                      sentinel file the flag watches.
//   RunCursor        - which stage / epoch / batch is in progress,
//                      reported when a run aborts
//   ValidationScope  - owns the evaluation copy of the classifier
//                      for one validation pass
//
// Evaluation mode in burn is a separate value: `model.valid()`
// returns the classifier on the inner backend with dropout off,
// while the training model is left as it was. Dropping the scope
// drops that copy, so training mode is back on every exit path.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::domain::error::TrainError;

// ─── StopFlag ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    requested: Arc<AtomicBool>,
    sentinel:  Option<PathBuf>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that also trips once `path` exists
    pub fn with_sentinel(path: impl Into<PathBuf>) -> Self {
        Self { requested: Arc::default(), sentinel: Some(path.into()) }
    }

    pub fn sentinel(&self) -> Option<&Path> {
        self.sentinel.as_deref()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        if self.requested.load(Ordering::SeqCst) {
            return true;
        }
        match &self.sentinel {
            Some(path) if path.exists() => {
                tracing::warn!("Stop file '{}' found", path.display());
                self.request_stop();
                true
            }
            _ => false,
        }
    }

    /// Err(Interrupted) when a stop was requested. `epoch` is zero-based,
    /// `batch` one-based; the error reports both one-based.
    pub fn check(&self, epoch: usize, batch: usize) -> Result<(), TrainError> {
        if self.is_stopped() {
            return Err(TrainError::Interrupted { epoch: epoch + 1, batch });
        }
        Ok(())
    }
}

// ─── RunCursor ────────────────────────────────────────────────────────────────
/// Coarse position of a run, as named in abort messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Train,
    Validation,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup      => write!(f, "setup"),
            Stage::Train      => write!(f, "train"),
            Stage::Validation => write!(f, "val"),
            Stage::Persist    => write!(f, "checkpoint save"),
        }
    }
}

#[derive(Debug)]
pub struct RunCursor {
    stage: Cell<Stage>,
    epoch: Cell<usize>,
    batch: Cell<usize>,
}

impl Default for RunCursor {
    fn default() -> Self {
        Self {
            stage: Cell::new(Stage::Setup),
            epoch: Cell::new(0),
            batch: Cell::new(0),
        }
    }
}

impl RunCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based epoch; the stage becomes Train
    pub fn start_epoch(&self, epoch: usize) {
        self.epoch.set(epoch);
        self.enter(Stage::Train);
    }

    pub fn enter(&self, stage: Stage) {
        self.stage.set(stage);
        self.batch.set(0);
    }

    pub fn set_batch(&self, batch: usize) {
        self.batch.set(batch);
    }

    /// (stage, zero-based epoch, one-based batch)
    pub fn position(&self) -> (Stage, usize, usize) {
        (self.stage.get(), self.epoch.get(), self.batch.get())
    }

    /// Abort message naming what was in progress
    pub fn describe(&self) -> String {
        let (stage, epoch, batch) = self.position();
        match stage {
            Stage::Setup   => "run aborted during setup".to_string(),
            Stage::Persist => format!("run aborted during {stage} of epoch {}", epoch + 1),
            _              => format!("run aborted during {stage} of epoch {}, batch {batch}", epoch + 1),
        }
    }
}

// ─── ValidationScope ──────────────────────────────────────────────────────────
/// Holds the evaluation copy of the classifier (or a borrow of an
/// already frozen one) for the length of one validation pass.
pub struct ValidationScope<M> {
    model: M,
}

impl<M> ValidationScope<M> {
    pub fn enter(model: M, cursor: &RunCursor) -> Self {
        cursor.enter(Stage::Validation);
        tracing::trace!("validation pass on an evaluation copy (dropout off)");
        Self { model }
    }
}

impl<M> Deref for ValidationScope<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> Drop for ValidationScope<M> {
    fn drop(&mut self) {
        tracing::trace!("evaluation copy released");
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared() {
        let flag  = StopFlag::new();
        let other = flag.clone();
        assert!(flag.check(0, 1).is_ok());
        other.request_stop();
        let err = flag.check(2, 7).unwrap_err();
        assert!(matches!(err, TrainError::Interrupted { epoch: 3, batch: 7 }));
    }

    #[test]
    fn test_sentinel_file_trips_the_flag() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("STOP");
        let flag = StopFlag::with_sentinel(&path);
        assert_eq!(flag.sentinel(), Some(path.as_path()));
        assert!(!flag.is_stopped());

        std::fs::write(&path, "").unwrap();
        assert!(flag.is_stopped());
        // stays tripped once seen
        std::fs::remove_file(&path).unwrap();
        assert!(flag.check(0, 1).is_err());
    }

    #[test]
    fn test_scope_marks_validation_and_keeps_it_on_error() {
        fn failing(cursor: &RunCursor, model: &[f32]) -> Result<(), TrainError> {
            let scope = ValidationScope::enter(model, cursor);
            assert_eq!(scope.len(), 3);
            cursor.set_batch(2);
            Err(TrainError::config("batch failed"))?;
            Ok(())
        }
        let cursor = RunCursor::new();
        cursor.start_epoch(0);
        let weights = vec![0.5f32; 3];

        assert!(failing(&cursor, &weights).is_err());
        assert_eq!(cursor.position(), (Stage::Validation, 0, 2));
        assert_eq!(cursor.describe(), "run aborted during val of epoch 1, batch 2");
        // the training-side value is untouched
        assert_eq!(weights, vec![0.5f32; 3]);
    }

    #[test]
    fn test_cursor_describes_each_stage() {
        let cursor = RunCursor::new();
        assert_eq!(cursor.describe(), "run aborted during setup");

        cursor.start_epoch(4);
        cursor.set_batch(9);
        assert_eq!(cursor.position(), (Stage::Train, 4, 9));
        assert_eq!(cursor.describe(), "run aborted during train of epoch 5, batch 9");

        cursor.enter(Stage::Persist);
        assert_eq!(cursor.describe(), "run aborted during checkpoint save of epoch 5");
    }
}
