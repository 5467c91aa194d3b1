// ============================================================
// Layer 5 - Epoch Runners
// ============================================================
// One traversal of one split, batch by batch.
//
// Train mode (Autodiff backend):
//
//   fetch → forward → loss → backward → optimizer step → accumulate
//     ▲                                                      │
//     └──────────────── next batch | epoch done ◄────────────┘
//
//   - Gradients are produced fresh by every backward() call, so
//     there is no gradient state to clear between batches.
//   - Progress goes to the observer every `log_interval` batches
//     and always on the final batch.
//   - A non-finite loss is reported (tracing warning + observer
//     event); NanPolicy decides whether the step still happens.
//
// Validation mode (inner backend):
//
//   fetch → forward → loss → accumulate
//
//   The caller hands in `model.valid()`: a copy on the
//   non-autodiff backend with dropout disabled. No graph is
//   recorded and no parameter can change, so two validation
//   passes over the same batches give identical summaries.
//
// Both runners observe the StopFlag before fetching each batch and
// fold into the aggregator they are handed, after resetting it.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::SkeletonBatcher, iterator::Traversal};
use crate::domain::metrics::{EpochSummary, MetricAggregator};
use crate::domain::traits::{BatchProgress, NumericFault, Phase, TrainingObserver};
use crate::ml::control::{RunCursor, StopFlag};
use crate::ml::model::{predictions, SequenceClassifier};
use crate::ml::placement::ComputePlacement;

/// What to do with a batch whose loss is NaN or infinite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NanPolicy {
    /// Report it and apply the optimizer step anyway
    #[default]
    Warn,
    /// Report it, skip backward and step, leave the batch out of the metrics
    SkipStep,
}

/// Per-epoch wiring shared by both runners
pub struct EpochContext<'a> {
    /// Zero-based epoch index
    pub epoch:        usize,
    pub log_interval: usize,
    pub stop:         &'a StopFlag,
    pub cursor:       &'a RunCursor,
    pub metrics:      &'a mut MetricAggregator,
    pub observer:     &'a mut dyn TrainingObserver,
}

/// Optimizer-side settings of the train runner
pub struct StepSettings<'a, O> {
    pub optim:       &'a mut O,
    pub lr:          f64,
    pub nan_policy:  NanPolicy,
    /// Batches applied over the whole run; advanced by this runner
    pub global_step: &'a mut usize,
}

// ─── Train mode ───────────────────────────────────────────────────────────────
pub fn train_epoch<B, O>(
    mut model: SequenceClassifier<B>,
    placement: &dyn ComputePlacement<B>,
    batcher:   &SkeletonBatcher<B>,
    mut batches: Traversal,
    step:      StepSettings<'_, O>,
    ctx:       EpochContext<'_>,
) -> Result<(SequenceClassifier<B>, EpochSummary)>
where
    B: AutodiffBackend,
    O: Optimizer<SequenceClassifier<B>, B>,
{
    let EpochContext { epoch, log_interval, stop, cursor, metrics, observer } = ctx;
    let StepSettings { optim, lr, nan_policy, global_step } = step;

    let num_batches = batches.len();
    let loss_fn     = CrossEntropyLossConfig::new().init(placement.primary());
    let mut index   = 0usize;
    metrics.reset();

    loop {
        // ── Fetch ─────────────────────────────────────────────────────────────
        cursor.set_batch(index + 1);
        stop.check(epoch, index + 1)?;
        let Some(items) = batches.next() else { break };
        index += 1;
        let items = items?;

        let batch = batcher.batch(items);
        model
            .check_input(batch.sequences.dims()[2])
            .with_context(|| format!("epoch {}, batch {index}", epoch + 1))?;

        // ── Forward + loss ────────────────────────────────────────────────────
        let logits     = placement.forward(&model, batch.sequences);
        let loss       = loss_fn.forward(logits.clone(), batch.labels);
        let loss_value = loss.clone().into_scalar().elem::<f64>();
        let predicted  = predictions(logits);

        *global_step += 1;
        let mut skipped = false;

        if !loss_value.is_finite() {
            skipped = nan_policy == NanPolicy::SkipStep;
            tracing::warn!(
                "Non-finite loss {} at epoch {}, batch {}/{}{}",
                loss_value, epoch + 1, index, num_batches,
                if skipped { " - optimizer step skipped" } else { "" },
            );
            observer.on_numeric_fault(&NumericFault { epoch, batch: index, loss: loss_value, skipped });
        }

        // ── Backward + step ───────────────────────────────────────────────────
        if !skipped {
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model     = optim.step(lr, model, grads);
            metrics.update(loss_value, &predicted, &batch.label_ids);
        }

        if index % log_interval == 0 || index == num_batches {
            observer.on_batch(&BatchProgress {
                epoch,
                batch: index,
                num_batches,
                samples: metrics.seen(),
                loss: loss_value,
                global_step: *global_step,
            });
        }
    }

    let summary = metrics.summary(epoch);
    observer.on_epoch(Phase::Train, &summary);
    Ok((model, summary))
}

// ─── Validation mode ──────────────────────────────────────────────────────────
pub fn validate_epoch<B: Backend>(
    model:       &SequenceClassifier<B>,
    placement:   &dyn ComputePlacement<B>,
    batcher:     &SkeletonBatcher<B>,
    mut batches: Traversal,
    ctx:         EpochContext<'_>,
) -> Result<EpochSummary> {
    let EpochContext { epoch, stop, cursor, metrics, observer, .. } = ctx;

    let loss_fn   = CrossEntropyLossConfig::new().init(placement.primary());
    let mut index = 0usize;
    metrics.reset();

    loop {
        cursor.set_batch(index + 1);
        stop.check(epoch, index + 1)?;
        let Some(items) = batches.next() else { break };
        index += 1;
        let items = items?;

        let batch = batcher.batch(items);
        model
            .check_input(batch.sequences.dims()[2])
            .with_context(|| format!("epoch {} validation, batch {index}", epoch + 1))?;

        let logits     = placement.forward(model, batch.sequences);
        let loss_value = loss_fn
            .forward(logits.clone(), batch.labels)
            .into_scalar()
            .elem::<f64>();

        if !loss_value.is_finite() {
            tracing::warn!("Non-finite validation loss {} at epoch {}, batch {}", loss_value, epoch + 1, index);
        }

        metrics.update(loss_value, &predictions(logits), &batch.label_ids);
    }

    let summary = metrics.summary(epoch);
    observer.on_epoch(Phase::Validation, &summary);
    Ok(summary)
}
