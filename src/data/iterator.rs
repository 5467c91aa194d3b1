// ============================================================
// Layer 4 - Batch Iterator
// ============================================================
// Restartable, finite traversal of one dataset split in batches.
//
//   BatchIterator::new(dataset, batch_size, shuffle, num_workers)
//       │
//       ▼  traverse(seed)         (one call per epoch)
//   Traversal                     ← Iterator<Item = Result<Vec<SkeletonSample>, TrainError>>
//
// Every traversal covers all N samples exactly once in
// ceil(N / batch_size) batches; only the last may be partial.
//
// Prefetching:
//   With n workers, worker w loads batches w, w+n, w+2n, ... into
//   its own bounded channel. The consumer reads batch k from
//   worker k % n, so batches arrive in iteration order no matter
//   which worker finishes first. Workers only read the dataset.
//
//   num_workers == 0 loads each batch inline on the caller's thread.
//
// Dropping a Traversal early (e.g. after a stop request) closes the
// channels; workers notice on their next send and exit. A worker
// that exits before delivering its stripe yields one
// Err(PrefetchFailed) and ends the traversal.

use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::{
    mpsc::{sync_channel, Receiver},
    Arc,
};
use std::thread::{self, JoinHandle};

use crate::data::dataset::SkeletonDataset;
use crate::domain::error::TrainError;
use crate::domain::sample::SkeletonSample;

/// Batches each worker may hold ahead of the consumer
const PREFETCH_DEPTH: usize = 2;

pub struct BatchIterator {
    dataset:     Arc<SkeletonDataset>,
    batch_size:  usize,
    shuffle:     bool,
    num_workers: usize,
}

impl BatchIterator {
    /// Fails when `batch_size == 0` or the dataset is empty.
    pub fn new(
        dataset:     Arc<SkeletonDataset>,
        batch_size:  usize,
        shuffle:     bool,
        num_workers: usize,
    ) -> Result<Self, TrainError> {
        if batch_size == 0 {
            return Err(TrainError::config("batch_size must be > 0"));
        }
        if dataset.is_empty() {
            return Err(TrainError::config("cannot iterate an empty dataset"));
        }
        Ok(Self { dataset, batch_size, shuffle, num_workers })
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Start one pass over the dataset. `seed` drives the shuffle;
    /// the same seed yields the same batch order.
    pub fn traverse(&self, seed: u64) -> Traversal {
        let plan = Arc::new(batch_plan(self.dataset.len(), self.batch_size, self.shuffle, seed));
        let total = plan.len();

        let workers = self.num_workers.min(total);
        if workers == 0 {
            return Traversal::inline(self.dataset.clone(), plan);
        }

        let mut receivers = Vec::with_capacity(workers);
        let mut handles   = Vec::with_capacity(workers);

        for w in 0..workers {
            let (tx, rx)    = sync_channel::<Vec<SkeletonSample>>(PREFETCH_DEPTH);
            let dataset     = self.dataset.clone();
            let worker_plan = plan.clone();

            let spawned = thread::Builder::new()
                .name(format!("batch-prefetch-{w}"))
                .spawn(move || {
                    for indices in worker_plan.iter().skip(w).step_by(workers) {
                        if tx.send(gather(&dataset, indices)).is_err() {
                            break;
                        }
                    }
                });

            match spawned {
                Ok(handle) => {
                    receivers.push(rx);
                    handles.push(handle);
                }
                Err(e) => {
                    tracing::warn!("Cannot start prefetch worker ({e}); loading batches inline");
                    drop(receivers);
                    handles.into_iter().for_each(|h| { let _ = h.join(); });
                    return Traversal::inline(self.dataset.clone(), plan);
                }
            }
        }

        Traversal {
            source: Source::Workers { receivers, handles },
            next:   0,
            total,
        }
    }
}

/// Sample indices of every batch, in delivery order
fn batch_plan(len: usize, batch_size: usize, shuffle: bool, seed: u64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..len).collect();
    if shuffle {
        order.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    order.chunks(batch_size).map(<[usize]>::to_vec).collect()
}

fn gather(dataset: &SkeletonDataset, indices: &[usize]) -> Vec<SkeletonSample> {
    indices.iter().filter_map(|&i| dataset.get(i)).collect()
}

enum Source {
    Inline {
        dataset: Arc<SkeletonDataset>,
        plan:    Arc<Vec<Vec<usize>>>,
    },
    Workers {
        receivers: Vec<Receiver<Vec<SkeletonSample>>>,
        handles:   Vec<JoinHandle<()>>,
    },
}

/// One in-progress epoch traversal
pub struct Traversal {
    source: Source,
    next:   usize,
    total:  usize,
}

impl Traversal {
    fn inline(dataset: Arc<SkeletonDataset>, plan: Arc<Vec<Vec<usize>>>) -> Self {
        let total = plan.len();
        Self { source: Source::Inline { dataset, plan }, next: 0, total }
    }
}

impl Iterator for Traversal {
    type Item = Result<Vec<SkeletonSample>, TrainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let k = self.next;
        self.next += 1;

        match &self.source {
            Source::Inline { dataset, plan } => Some(Ok(gather(dataset, &plan[k]))),
            Source::Workers { receivers, .. } => match receivers[k % receivers.len()].recv() {
                Ok(items) => Some(Ok(items)),
                Err(_) => {
                    let missing = self.total - k;
                    self.next   = self.total;
                    tracing::error!("Prefetch worker {} hung up; {} batches undelivered", k % receivers.len(), missing);
                    Some(Err(TrainError::PrefetchFailed { batch: k + 1 }))
                }
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Traversal {}

impl Drop for Traversal {
    fn drop(&mut self) {
        if let Source::Workers { receivers, handles } = &mut self.source {
            receivers.clear();
            for handle in handles.drain(..) {
                if handle.join().is_err() {
                    tracing::warn!("A batch prefetch worker panicked");
                }
            }
        }
    }
}
