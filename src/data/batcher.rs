// ============================================================
// Layer 4 - Skeleton Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<SkeletonSample>
// into device tensors.
//
//   Input:  Vec of B samples, each T frames × F features
//   Output: SkeletonBatch with
//             sequences [B, T, F]  (float)
//             labels    [B]        (int)
//
// All samples in a split share (T, F), so the frames are simply
// concatenated and reshaped:
//   [s1_f1, s1_f2, ..., s1_fT, s2_f1, ..., sB_fT] → [B, T, F]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::SkeletonSample;

// ─── SkeletonBatch ────────────────────────────────────────────────────────────
/// A batch of sequences ready for the classifier forward pass.
#[derive(Debug, Clone)]
pub struct SkeletonBatch<B: Backend> {
    /// Joint-coordinate sequences - shape: [batch_size, seq_len, feature_dim]
    pub sequences: Tensor<B, 3>,

    /// Class labels - shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,

    /// Host copy of the labels, used for accuracy bookkeeping
    pub label_ids: Vec<usize>,
}

// ─── SkeletonBatcher ──────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the
/// model lives.
#[derive(Clone, Debug)]
pub struct SkeletonBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SkeletonBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SkeletonSample, SkeletonBatch<B>> for SkeletonBatcher<B> {
    fn batch(&self, items: Vec<SkeletonSample>) -> SkeletonBatch<B> {
        let batch_size  = items.len();
        let seq_len     = items.first().map_or(0, |s| s.seq_len);
        let feature_dim = items.first().map_or(0, |s| s.feature_dim);

        // ── Flatten frames ────────────────────────────────────────────────────
        let flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.frames.iter().copied())
            .collect();

        let label_ids: Vec<usize> = items.iter().map(|s| s.label).collect();
        let label_raw: Vec<i64>   = label_ids.iter().map(|&l| l as i64).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let sequences = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, seq_len, feature_dim]),
            &self.device,
        );

        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(label_raw, [batch_size]),
            &self.device,
        );

        SkeletonBatch { sequences, labels, label_ids }
    }
}
