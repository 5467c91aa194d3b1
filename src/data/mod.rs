// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from skeleton text files to device-ready batches.
//
//   per-class .txt clips            generated trajectories
//       │                                   │
//       ▼                                   ▼
//   DirectorySource                   SyntheticSource
//   (+ Preprocessor)                        │
//       └──────────────┬────────────────────┘
//                      ▼
//   SkeletonDataset    → implements Burn's Dataset trait
//                      │
//                      ▼
//   BatchIterator      → ordered, prefetched batch traversal
//                      │
//                      ▼
//   SkeletonBatcher    → stacks samples into tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the per-class skeleton folders and the label dictionary
pub mod loader;

/// Frame resampling, joint selection, standardisation
pub mod preprocessor;

/// Generated trajectories for runs without a corpus
pub mod synthetic;

/// Implements Burn's Dataset trait for skeleton samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Restartable batch traversal with ordered prefetching
pub mod iterator;

/// Seeded train/validation partitioning
pub mod splitter;
