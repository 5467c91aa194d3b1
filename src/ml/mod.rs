// ============================================================
// Layer 5 - ML Layer (Burn)
// ============================================================
// All training-time tensor work lives here.
//
//   model.rs      - SequenceClassifier: stacked LSTM or GRU cells,
//                   final-timestep output, FC head with dropout,
//                   raw logits out
//
//   placement.rs  - ComputePlacement: single device or batch
//                   replication across several devices
//
//   control.rs    - StopFlag, RunCursor, ValidationScope
//
//   runner.rs     - train_epoch / validate_epoch over one split
//
//   trainer.rs    - Trainer: the epoch loop, Adam, checkpoints
//
//   evaluator.rs  - one validation pass over a saved checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// LSTM / GRU sequence classifier
pub mod model;

/// Single-device and replicated forward passes
pub mod placement;

/// Stop requests, progress cursor, evaluation-mode guard
pub mod control;

/// Train and validation epoch runners
pub mod runner;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint evaluation
pub mod evaluator;

/// CPU training backend, always available
pub type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// GPU training backend (feature `wgpu`)
#[cfg(feature = "wgpu")]
pub type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
