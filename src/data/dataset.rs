use burn::data::dataset::Dataset;

use crate::domain::error::TrainError;
use crate::domain::sample::SkeletonSample;

/// One split's worth of samples, all with the same (seq_len, feature_dim).
#[derive(Debug, Clone)]
pub struct SkeletonDataset {
    samples: Vec<SkeletonSample>,
}

impl SkeletonDataset {
    /// Wrap samples, rejecting a split whose samples disagree on shape.
    pub fn new(samples: Vec<SkeletonSample>) -> Result<Self, TrainError> {
        if let Some(first) = samples.first() {
            let shape = (first.seq_len, first.feature_dim);
            if let Some(odd) = samples.iter().find(|s| (s.seq_len, s.feature_dim) != shape) {
                return Err(TrainError::config(format!(
                    "inconsistent sample shapes: ({}, {}) vs ({}, {})",
                    shape.0, shape.1, odd.seq_len, odd.feature_dim
                )));
            }
        }
        Ok(Self { samples })
    }

    /// Values per frame, or None for an empty split
    pub fn feature_dim(&self) -> Option<usize> {
        self.samples.first().map(|s| s.feature_dim)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Every label must lie in [0, num_classes)
    pub fn check_labels(&self, num_classes: usize) -> Result<(), TrainError> {
        match self.samples.iter().find(|s| s.label >= num_classes) {
            Some(s) => Err(TrainError::LabelOutOfRange { label: s.label, num_classes }),
            None    => Ok(()),
        }
    }
}

impl Dataset<SkeletonSample> for SkeletonDataset {
    fn get(&self, index: usize) -> Option<SkeletonSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
