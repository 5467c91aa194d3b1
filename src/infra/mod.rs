// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to one business layer:
//
//   checkpoint.rs  - per-epoch weight files (write-then-rename)
//                    and train_config.json
//
//   metrics.rs     - metrics.csv + scalars.jsonl, as an observer
//
//   logging.rs     - stdout + per-run log file, banners, and the
//                    observer that prints training progress
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metric series on disk
pub mod metrics;

/// Subscriber setup and progress lines
pub mod logging;
