// ============================================================
// Layer 5 - Evaluator
// ============================================================
// Runs one validation epoch against a saved checkpoint.
//
//   1. Rebuild the classifier from train_config.json (dropout 0)
//   2. Load the checkpoint's weights into it
//   3. validate_epoch over the given split
//
// Works on any non-autodiff backend: nothing here needs gradients.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SkeletonBatcher, dataset::SkeletonDataset, iterator::BatchIterator};
use crate::domain::error::TrainError;
use crate::domain::metrics::{EpochSummary, MetricAggregator};
use crate::domain::traits::TrainingObserver;
use crate::infra::checkpoint::{epoch_of, CheckpointManager};
use crate::ml::control::{RunCursor, StopFlag, ValidationScope};
use crate::ml::model::SequenceClassifier;
use crate::ml::placement::{select_placement, ComputePlacement};
use crate::ml::runner::{validate_epoch, EpochContext};

pub struct Evaluator<B: Backend> {
    model:      SequenceClassifier<B>,
    placement:  Box<dyn ComputePlacement<B>>,
    checkpoint: PathBuf,
}

impl<B: Backend> Evaluator<B> {
    pub fn from_checkpoint(
        cfg:         &TrainConfig,
        checkpoints: &CheckpointManager,
        checkpoint:  &Path,
        devices:     &[B::Device],
    ) -> Result<Self> {
        let placement = select_placement::<B>(devices);
        let model_cfg = cfg.model_config().with_dropout(0.0);
        model_cfg.check()?;

        let model = model_cfg.init::<B>(placement.primary());
        let model = checkpoints.load_model(model, checkpoint, placement.primary())?;
        tracing::info!("Model loaded from '{}'", checkpoint.display());

        Ok(Self { model, placement, checkpoint: checkpoint.to_path_buf() })
    }

    /// Zero-based epoch the loaded checkpoint was written after
    pub fn epoch(&self) -> usize {
        epoch_of(&self.checkpoint).unwrap_or(0)
    }

    pub fn evaluate(
        &self,
        split:       SkeletonDataset,
        batch_size:  usize,
        num_workers: usize,
        observer:    &mut dyn TrainingObserver,
    ) -> Result<EpochSummary> {
        if split.is_empty() {
            return Err(TrainError::EmptySplit { split: "validation" }.into());
        }

        let batches = BatchIterator::new(Arc::new(split), batch_size, false, num_workers)?;
        let batcher = SkeletonBatcher::<B>::new(self.placement.primary().clone());
        let stop        = StopFlag::new();
        let cursor      = RunCursor::new();
        let mut metrics = MetricAggregator::new();
        cursor.start_epoch(self.epoch());

        // loaded with dropout 0 and never stepped: already an evaluation copy
        let eval = ValidationScope::enter(&self.model, &cursor);
        validate_epoch(
            *eval,
            self.placement.as_ref(),
            &batcher,
            batches.traverse(0),
            EpochContext {
                epoch:        self.epoch(),
                log_interval: 1,
                stop:         &stop,
                cursor:       &cursor,
                metrics:      &mut metrics,
                observer,
            },
        )
        .with_context(|| cursor.describe())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticSource;
    use crate::domain::traits::{Observers, SkeletonSource, Split};
    use crate::ml::model::CellType;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    type B = NdArray;

    #[test]
    fn test_evaluates_saved_weights() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = TrainConfig {
            num_classes:      3,
            sequence_length:  5,
            hidden_size:      6,
            head_hidden_size: 6,
            cell:             CellType::Lstm,
            ..TrainConfig::default()
        };
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let model: SequenceClassifier<B> = cfg.model_config().init(&NdArrayDevice::Cpu);
        let path = ckpt.save_model(&model, 6).unwrap();

        let source = SyntheticSource::new(3, 5, 5, cfg.feature_dim());
        let split  = SkeletonDataset::new(source.load(Split::Validation).unwrap()).unwrap();
        let n      = split.len();

        let eval = Evaluator::<B>::from_checkpoint(&cfg, &ckpt, &path, &[]).unwrap();
        assert_eq!(eval.epoch(), 6);

        let summary = eval.evaluate(split, 2, 0, &mut Observers::new()).unwrap();
        assert_eq!(summary.samples, n);
        assert_eq!(summary.epoch, 6);
    }

    #[test]
    fn test_empty_split_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = TrainConfig { hidden_size: 4, head_hidden_size: 4, ..TrainConfig::default() };
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let path = ckpt
            .save_model(&cfg.model_config().init::<B>(&NdArrayDevice::Cpu), 0)
            .unwrap();

        let eval = Evaluator::<B>::from_checkpoint(&cfg, &ckpt, &path, &[]).unwrap();
        let err  = eval
            .evaluate(SkeletonDataset::new(Vec::new()).unwrap(), 4, 0, &mut Observers::new())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::EmptySplit { .. })));
    }
}
