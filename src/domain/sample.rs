use serde::{Deserialize, Serialize};

/// One fixed-length joint-coordinate sequence and its class label.
/// `frames` is row-major: frame 0's features, then frame 1's, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonSample {
    pub frames:      Vec<f32>,
    pub seq_len:     usize,
    pub feature_dim: usize,
    pub label:       usize,
}

impl SkeletonSample {
    pub fn new(frames: Vec<f32>, seq_len: usize, feature_dim: usize, label: usize) -> Self {
        debug_assert_eq!(frames.len(), seq_len * feature_dim);
        Self { frames, seq_len, feature_dim, label }
    }
}
