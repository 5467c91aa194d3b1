// ============================================================
// Layer 3 - Metric Aggregator
// ============================================================
// Accumulates loss and accuracy across the mini-batches of one
// epoch traversal.
//
//   loss_sum += batch_loss * batch_size   (sample-weighted)
//   correct  += #positions where prediction == label
//   seen     += batch_size
//
//   mean_loss = loss_sum / seen
//   accuracy  = correct  / seen
//
// Weighting by batch size keeps the last, partial batch from
// skewing the mean: N=10, B=4 gives batches of 4, 4, 2 and each
// sample counts exactly once.
//
// An empty traversal (seen == 0) yields a zero summary and a
// warning instead of dividing by zero.

use serde::{Deserialize, Serialize};

/// Mutable per-epoch accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMetrics {
    pub loss_sum: f64,
    pub correct:  usize,
    pub seen:     usize,
}

/// Immutable epoch-level result read out of the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Zero-based epoch index
    pub epoch:     usize,
    pub mean_loss: f64,
    /// Fraction in [0, 1]
    pub accuracy:  f64,
    /// Number of samples the summary covers
    pub samples:   usize,
}

impl EpochSummary {
    /// True when the summary covers no samples (sentinel zeros)
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

#[derive(Debug, Default)]
pub struct MetricAggregator {
    running: RunningMetrics,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the accumulator back to {0.0, 0, 0}
    pub fn reset(&mut self) {
        self.running = RunningMetrics::default();
    }

    /// Fold one batch into the running totals.
    /// `batch_loss` is the batch's mean loss; it is re-weighted by
    /// the number of samples in the batch.
    pub fn update(&mut self, batch_loss: f64, predictions: &[usize], labels: &[usize]) {
        debug_assert_eq!(predictions.len(), labels.len());

        let batch_size = labels.len();
        let correct    = predictions
            .iter()
            .zip(labels)
            .filter(|(p, l)| p == l)
            .count();

        self.running.loss_sum += batch_loss * batch_size as f64;
        self.running.correct  += correct;
        self.running.seen     += batch_size;
    }

    pub fn seen(&self) -> usize {
        self.running.seen
    }

    /// Read the epoch-level mean loss and accuracy.
    pub fn summary(&self, epoch: usize) -> EpochSummary {
        let RunningMetrics { loss_sum, correct, seen } = self.running;

        if seen == 0 {
            tracing::warn!(
                "Epoch {} saw no samples; reporting zero loss and accuracy (empty split?)",
                epoch + 1
            );
            return EpochSummary { epoch, mean_loss: 0.0, accuracy: 0.0, samples: 0 };
        }

        EpochSummary {
            epoch,
            mean_loss: loss_sum / seen as f64,
            accuracy:  correct as f64 / seen as f64,
            samples:   seen,
        }
    }
}
