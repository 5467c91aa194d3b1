// ============================================================
// Layer 4 - Synthetic Skeleton Source
// ============================================================
// Generates labelled joint trajectories without a corpus on disk,
// for smoke runs (`train --synthetic N`) and tests.
//
// Class c moves every coordinate along a sinusoid whose frequency
// and phase depend on c, plus seeded Gaussian-ish noise, so the
// classes are separable but not trivially so:
//
//   x[t, k] = sin(2π · (1 + c/2) · t/T + k · (c + 1) · 0.3) + noise
//
// Output is deterministic for a given seed.

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::splitter::split_train_val;
use crate::domain::sample::SkeletonSample;
use crate::domain::traits::{SkeletonSource, Split};

pub struct SyntheticSource {
    pub num_classes:    usize,
    pub per_class:      usize,
    pub seq_len:        usize,
    pub feature_dim:    usize,
    pub train_fraction: f64,
    pub seed:           u64,
    pub noise:          f32,
}

impl SyntheticSource {
    pub fn new(num_classes: usize, per_class: usize, seq_len: usize, feature_dim: usize) -> Self {
        Self {
            num_classes,
            per_class,
            seq_len,
            feature_dim,
            train_fraction: 0.8,
            seed:           0,
            noise:          0.05,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_train_fraction(mut self, train_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self
    }

    fn generate(&self, class_id: usize, index: usize) -> SkeletonSample {
        let mut rng = StdRng::seed_from_u64(
            self.seed ^ ((class_id as u64) << 32) ^ index as u64,
        );
        let freq  = 1.0 + class_id as f32 * 0.5;
        let phase = (class_id as f32 + 1.0) * 0.3;

        let mut frames = Vec::with_capacity(self.seq_len * self.feature_dim);
        for t in 0..self.seq_len {
            let progress = t as f32 / self.seq_len as f32;
            for k in 0..self.feature_dim {
                let clean = (std::f32::consts::TAU * freq * progress + k as f32 * phase).sin();
                let noise = (rng.gen::<f32>() - 0.5) * 2.0 * self.noise;
                frames.push(clean + noise);
            }
        }
        SkeletonSample::new(frames, self.seq_len, self.feature_dim, class_id)
    }
}

impl SkeletonSource for SyntheticSource {
    fn load(&self, split: Split) -> Result<Vec<SkeletonSample>> {
        let mut samples = Vec::new();
        for class_id in 0..self.num_classes {
            let indices: Vec<usize> = (0..self.per_class).collect();
            let (train, val) = split_train_val(
                indices,
                self.train_fraction,
                self.seed.wrapping_add(class_id as u64),
            );
            let chosen = if split.is_train() { train } else { val };
            samples.extend(chosen.into_iter().map(|i| self.generate(class_id, i)));
        }
        tracing::debug!("Generated {} synthetic {} samples", samples.len(), split.as_str());
        Ok(samples)
    }

    fn feature_dim(&self) -> usize {
        self.feature_dim
    }
}
