// ============================================================
// Layer 3 - Error Taxonomy
// ============================================================
// Typed failures the training core can report. Each variant
// belongs to one of the classes of the run's error policy:
//
//   configuration  - InvalidConfig, EmptySplit, FeatureDimMismatch,
//                    UnknownJoint, LabelOutOfRange
//   interruption   - Interrupted (external stop between batches)
//   data loading   - PrefetchFailed (a worker exited mid-traversal)
//   persistence    - Checkpoint
//
// Numeric instability is not an error: it is reported to the
// observers as a NumericFault and training continues.
//
// Callers work with anyhow::Result at layer boundaries and can
// recover the typed variant with `err.downcast_ref::<TrainError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    /// A hyperparameter is outside its allowed range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A dataset split contains no samples
    #[error("the {split} split is empty")]
    EmptySplit { split: &'static str },

    /// Sequence feature dimension differs from the classifier's input size
    #[error("feature dimension mismatch: classifier expects {expected} inputs per frame, data has {found}")]
    FeatureDimMismatch { expected: usize, found: usize },

    /// A selected joint name is not part of the skeleton layout
    #[error("unknown joint '{0}'")]
    UnknownJoint(String),

    /// A label is outside [0, num_classes)
    #[error("label {label} is outside [0, {num_classes})")]
    LabelOutOfRange { label: usize, num_classes: usize },

    /// An external stop request was observed between batches
    #[error("run interrupted before epoch {epoch}, batch {batch}")]
    Interrupted { epoch: usize, batch: usize },

    /// A prefetch worker exited before delivering this one-based batch
    #[error("batch {batch} was never delivered: its prefetch worker exited early")]
    PrefetchFailed { batch: usize },

    /// Writing or reading a checkpoint failed
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl TrainError {
    /// Shorthand for building an InvalidConfig error
    pub fn config(msg: impl Into<String>) -> Self {
        TrainError::InvalidConfig(msg.into())
    }
}
