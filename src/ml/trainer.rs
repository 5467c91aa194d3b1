// ============================================================
// Layer 5 - Training Orchestrator
// ============================================================
// Owns the epoch loop:
//
//   for epoch in 0..epochs:
//       train_epoch        (Autodiff backend, Adam step per batch)
//       validate_epoch     (model.valid(), inner backend, no dropout)
//       save checkpoint    slr_skeleton_epoch{NNN}.pth
//       emit summary       log line + observers
//
// The RunCursor follows the loop (setup → train → val → checkpoint
// save); a failure is reported with the stage it happened in.
//
// Before the loop:
//   - the placement strategy is picked from the device list
//     (one device → single, several → replicated)
//   - the training split must be non-empty and both splits must
//     match the classifier's input size and class count, so a
//     mismatch fails before the first optimizer step
//   - an empty validation split is allowed: validation is skipped
//     with a warning and reports a zero summary
//
// Model State (parameters + Adam moments) lives only inside `fit`
// and is touched only by this thread.
//
// Key Burn insight:
//   - Training uses B (Autodiff<...>) for gradients
//   - model.valid() returns the model on B::InnerBackend, so the
//     validation batcher and placement use the inner backend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::AdamConfig,
    tensor::backend::AutodiffBackend,
};
use std::{path::PathBuf, sync::Arc};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SkeletonBatcher, dataset::SkeletonDataset, iterator::BatchIterator};
use crate::domain::error::TrainError;
use crate::domain::metrics::{EpochSummary, MetricAggregator};
use crate::domain::traits::{Observers, Phase, TrainingObserver};
use crate::infra::{checkpoint::CheckpointManager, logging::banner};
use crate::ml::control::{RunCursor, Stage, StopFlag, ValidationScope};
use crate::ml::model::{SequenceClassifier, SequenceClassifierConfig};
use crate::ml::placement::{select_placement, ComputePlacement};
use crate::ml::runner::{train_epoch, validate_epoch, EpochContext, StepSettings};

/// Offset separating the validation shuffle stream from the training one
const VAL_SEED_OFFSET: u64 = 1_000_003;

/// Outcome of one completed epoch
#[derive(Debug, Clone)]
pub struct EpochReport {
    /// Zero-based epoch index
    pub epoch:      usize,
    pub train:      EpochSummary,
    pub val:        EpochSummary,
    pub checkpoint: PathBuf,
}

pub struct Trainer<'a, B: AutodiffBackend> {
    cfg:           &'a TrainConfig,
    model_cfg:     SequenceClassifierConfig,
    placement:     Box<dyn ComputePlacement<B>>,
    val_placement: Box<dyn ComputePlacement<B::InnerBackend>>,
    checkpoints:   CheckpointManager,
    observers:     Observers,
    stop:          StopFlag,
    cursor:        RunCursor,
    metrics:       MetricAggregator,
}

impl<'a, B: AutodiffBackend> Trainer<'a, B> {
    /// Validate the run configuration and pick the compute placement.
    /// An empty `devices` list means the backend's default device.
    pub fn new(
        cfg:         &'a TrainConfig,
        devices:     &[B::Device],
        checkpoints: CheckpointManager,
        observers:   Observers,
        stop:        StopFlag,
    ) -> Result<Self> {
        cfg.validate()?;
        let model_cfg = cfg.model_config();
        model_cfg.check()?;

        let placement     = select_placement::<B>(devices);
        let val_placement = select_placement::<B::InnerBackend>(devices);
        tracing::info!("Compute placement: {}", placement.describe());

        Ok(Self {
            cfg,
            model_cfg,
            placement,
            val_placement,
            checkpoints,
            observers,
            stop,
            cursor:  RunCursor::new(),
            metrics: MetricAggregator::new(),
        })
    }

    /// Run the full `epochs`-long sweep from freshly initialised weights.
    pub fn fit(mut self, train: SkeletonDataset, val: SkeletonDataset) -> Result<Vec<EpochReport>> {
        let result = self.run(train, val);
        result.with_context(|| self.cursor.describe())
    }

    fn run(&mut self, train: SkeletonDataset, val: SkeletonDataset) -> Result<Vec<EpochReport>> {
        let cfg = self.cfg;

        // ── Check both splits against the architecture ────────────────────────
        if train.is_empty() {
            return Err(TrainError::EmptySplit { split: "training" }.into());
        }
        self.check_split(&train)?;
        if val.is_empty() {
            tracing::warn!("Validation split is empty; validation will be skipped every epoch");
        } else {
            self.check_split(&val)?;
        }
        tracing::info!("Dataset samples: {} ({} train, {} validation)", train.len() + val.len(), train.len(), val.len());

        let train_iter = BatchIterator::new(Arc::new(train), cfg.batch_size, true, cfg.num_workers)?;
        let val_iter   = if val.is_empty() {
            None
        } else {
            Some(BatchIterator::new(Arc::new(val), cfg.batch_size, cfg.shuffle_val, cfg.num_workers)?)
        };
        tracing::info!(
            "Batches per epoch: {} train, {} validation",
            train_iter.num_batches(),
            val_iter.as_ref().map_or(0, BatchIterator::num_batches),
        );

        // ── Model + Adam ──────────────────────────────────────────────────────
        B::seed(cfg.seed);
        let mut model: SequenceClassifier<B> = self.model_cfg.init(self.placement.primary());
        let mut optim = AdamConfig::new()
            .with_grad_clipping(cfg.grad_clip.map(GradientClippingConfig::Norm))
            .init::<B, SequenceClassifier<B>>();

        let train_batcher = SkeletonBatcher::<B>::new(self.placement.primary().clone());
        let val_batcher   = SkeletonBatcher::<B::InnerBackend>::new(self.val_placement.primary().clone());

        tracing::info!(
            "Model ready: {:?} x{} hidden={} head={} classes={} dropout={}",
            self.model_cfg.cell, self.model_cfg.num_layers, self.model_cfg.hidden_size,
            self.model_cfg.head_hidden_size, self.model_cfg.num_classes, self.model_cfg.dropout,
        );

        // ── Epoch loop ────────────────────────────────────────────────────────
        tracing::info!("{}", banner("Training Started"));
        let mut reports     = Vec::with_capacity(cfg.epochs);
        let mut global_step = 0usize;

        for epoch in 0..cfg.epochs {
            self.cursor.start_epoch(epoch);

            // ── Training phase ────────────────────────────────────────────────
            let (trained, train_summary) = train_epoch(
                model,
                self.placement.as_ref(),
                &train_batcher,
                train_iter.traverse(cfg.seed.wrapping_add(epoch as u64)),
                StepSettings {
                    optim:       &mut optim,
                    lr:          cfg.learning_rate,
                    nan_policy:  cfg.nan_policy,
                    global_step: &mut global_step,
                },
                EpochContext {
                    epoch,
                    log_interval: cfg.log_interval,
                    stop:         &self.stop,
                    cursor:       &self.cursor,
                    metrics:      &mut self.metrics,
                    observer:     &mut self.observers,
                },
            )?;
            model = trained;

            // ── Validation phase ──────────────────────────────────────────────
            let val_summary = {
                let eval = ValidationScope::enter(model.valid(), &self.cursor);
                match &val_iter {
                    Some(it) => validate_epoch(
                        &*eval,
                        self.val_placement.as_ref(),
                        &val_batcher,
                        it.traverse(cfg.seed.wrapping_add(VAL_SEED_OFFSET + epoch as u64)),
                        EpochContext {
                            epoch,
                            log_interval: cfg.log_interval,
                            stop:         &self.stop,
                            cursor:       &self.cursor,
                            metrics:      &mut self.metrics,
                            observer:     &mut self.observers,
                        },
                    )?,
                    None => {
                        self.metrics.reset();
                        let empty = self.metrics.summary(epoch);
                        self.observers.on_epoch(Phase::Validation, &empty);
                        empty
                    }
                }
            };

            // ── Persist ───────────────────────────────────────────────────────
            self.cursor.enter(Stage::Persist);
            let checkpoint = self
                .checkpoints
                .save_model(&model, epoch)
                .with_context(|| format!("saving checkpoint for epoch {}", epoch + 1))?;
            self.observers.on_checkpoint(epoch, &checkpoint);

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.2}% | val_loss={:.4} | val_acc={:.2}%",
                epoch + 1, cfg.epochs,
                train_summary.mean_loss, train_summary.accuracy * 100.0,
                val_summary.mean_loss, val_summary.accuracy * 100.0,
            );

            reports.push(EpochReport { epoch, train: train_summary, val: val_summary, checkpoint });
        }

        tracing::info!("{}", banner("Training Finished"));
        Ok(reports)
    }

    fn check_split(&self, split: &SkeletonDataset) -> Result<()> {
        if let Some(found) = split.feature_dim() {
            if found != self.model_cfg.input_size {
                return Err(TrainError::FeatureDimMismatch { expected: self.model_cfg.input_size, found }.into());
            }
        }
        split.check_labels(self.model_cfg.num_classes)?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticSource;
    use crate::domain::traits::{SkeletonSource, Split};
    use crate::ml::model::CellType;
    use burn::backend::{Autodiff, NdArray};

    type AD = Autodiff<NdArray>;

    fn config(model_dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            model_dir:        model_dir.display().to_string(),
            epochs:           3,
            batch_size:       4,
            learning_rate:    1e-2,
            log_interval:     2,
            num_classes:      3,
            sequence_length:  6,
            selected_joints:  vec!["HANDLEFT".into(), "HANDRIGHT".into()],
            hidden_size:      8,
            num_layers:       1,
            head_hidden_size: 8,
            cell:             CellType::Lstm,
            ..TrainConfig::default()
        }
    }

    fn splits(cfg: &TrainConfig) -> (SkeletonDataset, SkeletonDataset) {
        let source = SyntheticSource::new(cfg.num_classes, 5, cfg.sequence_length, cfg.feature_dim());
        (
            SkeletonDataset::new(source.load(Split::Train).unwrap()).unwrap(),
            SkeletonDataset::new(source.load(Split::Validation).unwrap()).unwrap(),
        )
    }

    fn trainer<'a>(cfg: &'a TrainConfig, stop: StopFlag) -> Trainer<'a, AD> {
        watched_trainer(cfg, stop, Observers::new())
    }

    fn watched_trainer<'a>(cfg: &'a TrainConfig, stop: StopFlag, observers: Observers) -> Trainer<'a, AD> {
        let ckpt = CheckpointManager::new(&cfg.model_dir).unwrap();
        Trainer::<AD>::new(cfg, &[], ckpt, observers, stop).unwrap()
    }

    /// Requests a stop as soon as `phase` of the first epoch ends
    struct StopAfter {
        phase: Phase,
        stop:  StopFlag,
    }

    impl TrainingObserver for StopAfter {
        fn on_epoch(&mut self, phase: Phase, _summary: &EpochSummary) {
            if phase == self.phase {
                self.stop.request_stop();
            }
        }
    }

    /// Removes the checkpoint directory once validation ends
    struct RemoveDirAfterValidation(std::path::PathBuf);

    impl TrainingObserver for RemoveDirAfterValidation {
        fn on_epoch(&mut self, phase: Phase, _summary: &EpochSummary) {
            if phase == Phase::Validation {
                std::fs::remove_dir_all(&self.0).unwrap();
            }
        }
    }

    #[test]
    fn test_one_checkpoint_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (train, val) = splits(&cfg);
        let n_train = train.len();
        let n_val   = val.len();

        let reports = trainer(&cfg, StopFlag::new()).fit(train, val).unwrap();

        assert_eq!(reports.len(), 3);
        for (i, r) in reports.iter().enumerate() {
            assert_eq!(r.epoch, i);
            assert_eq!(r.train.samples, n_train);
            assert_eq!(r.val.samples, n_val);
            assert!(r.checkpoint.exists());
        }
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let names: Vec<String> = ckpt
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![
            "slr_skeleton_epoch001.pth",
            "slr_skeleton_epoch002.pth",
            "slr_skeleton_epoch003.pth",
        ]);
    }

    #[test]
    fn test_empty_validation_split_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { epochs: 1, ..config(dir.path()) };
        let (train, _) = splits(&cfg);

        let reports = trainer(&cfg, StopFlag::new())
            .fit(train, SkeletonDataset::new(Vec::new()).unwrap())
            .unwrap();
        assert!(reports[0].val.is_empty());
        assert_eq!(reports[0].val.accuracy, 0.0);
    }

    #[test]
    fn test_empty_training_split_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (_, val) = splits(&cfg);

        let err = trainer(&cfg, StopFlag::new())
            .fit(SkeletonDataset::new(Vec::new()).unwrap(), val)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::EmptySplit { .. })));
    }

    #[test]
    fn test_feature_mismatch_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = SyntheticSource::new(3, 5, cfg.sequence_length, cfg.feature_dim() + 2);
        let train  = SkeletonDataset::new(source.load(Split::Train).unwrap()).unwrap();
        let val    = SkeletonDataset::new(source.load(Split::Validation).unwrap()).unwrap();

        let err = trainer(&cfg, StopFlag::new()).fit(train, val).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::FeatureDimMismatch { expected: 4, found: 6 })
        ));
        assert!(CheckpointManager::new(dir.path()).unwrap().latest().unwrap().is_none());
    }

    #[test]
    fn test_stop_request_aborts_with_position() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = config(dir.path());
        let (train, val) = splits(&cfg);
        let stop = StopFlag::new();
        stop.request_stop();

        let err = trainer(&cfg, stop).fit(train, val).unwrap_err();
        assert!(format!("{err:#}").contains("epoch 1"));
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Interrupted { .. })));
    }

    #[test]
    fn test_stop_during_validation_is_reported_as_validation() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = config(dir.path());
        let (train, val) = splits(&cfg);
        let stop = StopFlag::new();
        let obs  = Observers::new().with(StopAfter { phase: Phase::Train, stop: stop.clone() });

        let err = watched_trainer(&cfg, stop, obs).fit(train, val).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("run aborted during val of epoch 1, batch 1"), "{msg}");
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::Interrupted { epoch: 1, batch: 1 })
        ));
    }

    #[test]
    fn test_failed_save_is_reported_as_checkpoint_save() {
        let dir       = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("models");
        let cfg       = config(&model_dir);
        let (train, val) = splits(&cfg);
        let obs = Observers::new().with(RemoveDirAfterValidation(model_dir.clone()));

        let err = watched_trainer(&cfg, StopFlag::new(), obs).fit(train, val).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("run aborted during checkpoint save of epoch 1"), "{msg}");
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Checkpoint(_))));
    }

    #[test]
    fn test_gradient_clipping_trains_normally() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { epochs: 2, grad_clip: Some(0.5), ..config(dir.path()) };
        let (train, val) = splits(&cfg);

        let reports = trainer(&cfg, StopFlag::new()).fit(train, val).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.train.mean_loss.is_finite() && r.val.mean_loss.is_finite()));
    }

    #[test]
    fn test_invalid_configuration_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { batch_size: 0, ..config(dir.path()) };
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(Trainer::<AD>::new(&cfg, &[], ckpt, Observers::new(), StopFlag::new()).is_err());
    }
}
