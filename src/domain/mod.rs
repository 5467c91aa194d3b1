// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: skeleton samples, the joint layout, the metric
// accumulator, the error taxonomy and the observer contract.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Typed failures of the training core
pub mod error;

/// Kinect joint names and joint selection
pub mod joints;

/// Loss / accuracy accumulation across batches
pub mod metrics;

/// One labelled joint-coordinate sequence
pub mod sample;

/// SkeletonSource and TrainingObserver abstractions
pub mod traits;
