// ============================================================
// Layer 2 - Evaluate Use Case
// ============================================================
// Scores a saved checkpoint on the validation split:
//   1. Load train_config.json from the model directory
//   2. Pick the requested checkpoint, or the newest one
//   3. Rebuild the validation split exactly as training did
//   4. Run one validation epoch and return its summary

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::domain::metrics::EpochSummary;
use crate::domain::traits::Observers;
use crate::infra::{checkpoint::CheckpointManager, logging::LogObserver};
use crate::ml::evaluator::Evaluator;

pub struct EvaluateUseCase {
    model_dir: String,
    /// 1-indexed epoch, as in the checkpoint file name
    epoch:     Option<usize>,
    data_path: Option<String>,
}

/// Which checkpoint was scored, and how it did
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub checkpoint: PathBuf,
    pub summary:    EpochSummary,
}

impl EvaluateUseCase {
    pub fn new(model_dir: String, epoch: Option<usize>, data_path: Option<String>) -> Self {
        Self { model_dir, epoch, data_path }
    }

    pub fn execute(&self) -> Result<Evaluation> {
        let checkpoints = CheckpointManager::new(&self.model_dir)?;
        let mut cfg     = checkpoints.load_config()?;
        if let Some(path) = &self.data_path {
            cfg.data_path = path.clone();
        }

        // ── Pick the checkpoint ───────────────────────────────────────────────
        let checkpoint = match self.epoch {
            Some(0) => anyhow::bail!("epochs are numbered from 1"),
            Some(n) => {
                let path = checkpoints.path_for(n - 1);
                if !path.is_file() {
                    anyhow::bail!("No checkpoint for epoch {} at '{}'", n, path.display());
                }
                path
            }
            None => checkpoints
                .latest()?
                .with_context(|| format!("No checkpoints in '{}'", self.model_dir))?,
        };

        // ── Rebuild the validation split ──────────────────────────────────────
        let (_, val) = cfg.load_splits()?;
        tracing::info!("Evaluating '{}' on {} validation samples", checkpoint.display(), val.len());

        let mut observers = Observers::new().with(LogObserver::new(cfg.epochs));
        let summary       = backend::evaluate(&cfg, &checkpoints, &checkpoint, val, &mut observers)?;

        Ok(Evaluation { checkpoint, summary })
    }
}

mod backend {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::data::dataset::SkeletonDataset;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use std::path::Path;

    fn evaluate_on_cpu(
        cfg:         &TrainConfig,
        checkpoints: &CheckpointManager,
        checkpoint:  &Path,
        val:         SkeletonDataset,
        observers:   &mut Observers,
    ) -> Result<EpochSummary> {
        Evaluator::<NdArray>::from_checkpoint(cfg, checkpoints, checkpoint, &[NdArrayDevice::Cpu])?
            .evaluate(val, cfg.batch_size, cfg.num_workers, observers)
    }

    #[cfg(feature = "wgpu")]
    pub fn evaluate(
        cfg:         &TrainConfig,
        checkpoints: &CheckpointManager,
        checkpoint:  &Path,
        val:         SkeletonDataset,
        observers:   &mut Observers,
    ) -> Result<EpochSummary> {
        use crate::ml::placement::usable_devices;
        use burn::backend::{wgpu::WgpuDevice, Wgpu};

        if cfg.devices.is_empty() {
            return evaluate_on_cpu(cfg, checkpoints, checkpoint, val, observers);
        }
        let requested = cfg.devices.iter().map(|&i| WgpuDevice::DiscreteGpu(i)).collect();
        let devices   = usable_devices::<Wgpu>(requested);
        if devices.is_empty() {
            tracing::warn!("None of the devices {:?} is available; evaluating on CPU", cfg.devices);
            return evaluate_on_cpu(cfg, checkpoints, checkpoint, val, observers);
        }
        Evaluator::<Wgpu>::from_checkpoint(cfg, checkpoints, checkpoint, &devices)?
            .evaluate(val, cfg.batch_size, cfg.num_workers, observers)
    }

    #[cfg(not(feature = "wgpu"))]
    pub fn evaluate(
        cfg:         &TrainConfig,
        checkpoints: &CheckpointManager,
        checkpoint:  &Path,
        val:         SkeletonDataset,
        observers:   &mut Observers,
    ) -> Result<EpochSummary> {
        evaluate_on_cpu(cfg, checkpoints, checkpoint, val, observers)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    fn train_small(dir: &std::path::Path) -> TrainConfig {
        let cfg = TrainConfig {
            model_dir:        dir.join("models").display().to_string(),
            runs_dir:         dir.join("runs").display().to_string(),
            synthetic:        Some(5),
            epochs:           2,
            batch_size:       4,
            num_classes:      3,
            sequence_length:  4,
            hidden_size:      6,
            head_hidden_size: 6,
            num_workers:      0,
            ..TrainConfig::default()
        };
        TrainUseCase::new(cfg.clone()).execute().unwrap();
        cfg
    }

    #[test]
    fn test_latest_checkpoint_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = train_small(dir.path());

        let out = EvaluateUseCase::new(cfg.model_dir.clone(), None, None).execute().unwrap();
        assert!(out.checkpoint.ends_with("slr_skeleton_epoch002.pth"));
        assert_eq!(out.summary.epoch, 1);
        assert!(out.summary.samples > 0);
    }

    #[test]
    fn test_explicit_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = train_small(dir.path());

        let out = EvaluateUseCase::new(cfg.model_dir.clone(), Some(1), None).execute().unwrap();
        assert!(out.checkpoint.ends_with("slr_skeleton_epoch001.pth"));
        assert!(EvaluateUseCase::new(cfg.model_dir.clone(), Some(9), None).execute().is_err());
        assert!(EvaluateUseCase::new(cfg.model_dir, Some(0), None).execute().is_err());
    }

    #[test]
    fn test_missing_model_dir_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvaluateUseCase::new(dir.path().display().to_string(), None, None)
            .execute()
            .unwrap_err();
        assert!(format!("{err:#}").contains("train_config.json"));
    }
}
