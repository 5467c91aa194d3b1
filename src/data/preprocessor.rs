// ============================================================
// Layer 4 - Skeleton Preprocessor
// ============================================================
// Turns a variable-length clip of raw 50-value frames into one
// fixed-length model input.
//
// Steps (applied in order):
//   1. Resample the clip to exactly `seq_len` frames by uniform
//      index sampling; a clip shorter than `seq_len` repeats its
//      last frame
//   2. Keep only the selected joints' (x, y) columns
//   3. Standardise the whole sequence to zero mean, unit std
//      (skipped when disabled or when the std is ~0)
//
// Reference: Rust Book §13 (Iterators)

use crate::domain::joints::JointSelection;

pub struct Preprocessor {
    seq_len:     usize,
    joints:      JointSelection,
    standardize: bool,
}

impl Preprocessor {
    pub fn new(seq_len: usize, joints: JointSelection, standardize: bool) -> Self {
        Self { seq_len, joints, standardize }
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn feature_dim(&self) -> usize {
        self.joints.feature_dim()
    }

    /// Build a `seq_len × feature_dim` row-major sequence from raw frames.
    /// Returns None for a clip with no frames.
    pub fn sequence(&self, raw_frames: &[Vec<f32>]) -> Option<Vec<f32>> {
        if raw_frames.is_empty() {
            return None;
        }

        // ── Step 1 + 2: resample and select joints ────────────────────────────
        let mut out = Vec::with_capacity(self.seq_len * self.feature_dim());
        for idx in sample_indices(raw_frames.len(), self.seq_len) {
            self.joints.project(&raw_frames[idx], &mut out);
        }

        // ── Step 3: standardise ───────────────────────────────────────────────
        if self.standardize {
            standardize(&mut out);
        }
        Some(out)
    }
}

/// Pick `seq_len` frame indices spread uniformly over `total` frames.
pub fn sample_indices(total: usize, seq_len: usize) -> Vec<usize> {
    if total >= seq_len {
        (0..seq_len).map(|i| i * total / seq_len).collect()
    } else {
        (0..seq_len).map(|i| i.min(total - 1)).collect()
    }
}

/// Zero mean, unit standard deviation, in place.
fn standardize(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let n    = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var  = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std  = var.sqrt();

    if std < 1e-6 {
        values.iter_mut().for_each(|v| *v -= mean);
    } else {
        values.iter_mut().for_each(|v| *v = (*v - mean) / std);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::joints::RAW_FRAME_WIDTH;

    fn raw_frame(value: f32) -> Vec<f32> {
        vec![value; RAW_FRAME_WIDTH]
    }

    #[test]
    fn test_downsampling_is_uniform() {
        assert_eq!(sample_indices(32, 16), (0..16).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(sample_indices(10, 4), vec![0, 2, 5, 7]);
    }

    #[test]
    fn test_short_clip_repeats_last_frame() {
        assert_eq!(sample_indices(3, 5), vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn test_sequence_shape() {
        let joints = JointSelection::resolve(&["HANDLEFT", "HANDRIGHT"]).unwrap();
        let pre    = Preprocessor::new(4, joints, false);
        let clip: Vec<Vec<f32>> = (0..8).map(|i| raw_frame(i as f32)).collect();

        let seq = pre.sequence(&clip).unwrap();
        assert_eq!(seq.len(), 4 * 4);
        // frame indices 0, 2, 4, 6
        assert_eq!(&seq[4..8], &[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(&seq[12..16], &[6.0, 6.0, 6.0, 6.0]);
    }

    #[test]
    fn test_standardized_sequence_has_zero_mean() {
        let joints = JointSelection::resolve(&["HEAD"]).unwrap();
        let pre    = Preprocessor::new(5, joints, true);
        let clip: Vec<Vec<f32>> = (0..5).map(|i| raw_frame(10.0 * i as f32)).collect();

        let seq  = pre.sequence(&clip).unwrap();
        let mean = seq.iter().sum::<f32>() / seq.len() as f32;
        let var  = seq.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / seq.len() as f32;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_clip_is_none() {
        let joints = JointSelection::resolve(&["HEAD"]).unwrap();
        assert!(Preprocessor::new(4, joints, true).sequence(&[]).is_none());
    }
}
