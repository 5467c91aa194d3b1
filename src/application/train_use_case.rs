// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the run configuration     (Layer 2)
//   Step 2: Build the skeleton source          (Layer 4 - data)
//   Step 3: Load train / validation splits     (Layer 4 - data)
//   Step 4: Save config for `evaluate`         (Layer 6 - infra)
//   Step 5: Open the metrics sink              (Layer 6 - infra)
//   Step 6: Pick backend + devices, run fit    (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::SkeletonDataset,
    loader::DirectorySource,
    preprocessor::Preprocessor,
    synthetic::SyntheticSource,
};
use crate::domain::error::TrainError;
use crate::domain::joints::JointSelection;
use crate::domain::traits::{Observers, SkeletonSource, Split};
use crate::infra::{checkpoint::CheckpointManager, logging::LogObserver, metrics::MetricsLogger};
use crate::ml::{
    control::StopFlag,
    model::{CellType, SequenceClassifierConfig},
    runner::NanPolicy,
    trainer::{EpochReport, Trainer},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// The Run Configuration: every path, hyperparameter and device
// choice of one run, passed explicitly into the orchestrator.
// Serialisable so `evaluate` can rebuild the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    // ── Paths ──
    pub data_path:        String,
    pub label_path:       String,
    pub model_dir:        String,
    pub log_dir:          String,
    pub runs_dir:         String,
    /// Generate this many samples per class instead of reading data_path
    pub synthetic:        Option<usize>,

    // ── Schedule ──
    pub epochs:           usize,
    pub batch_size:       usize,
    pub learning_rate:    f64,
    pub log_interval:     usize,

    // ── Data ──
    pub num_classes:      usize,
    pub sequence_length:  usize,
    pub selected_joints:  Vec<String>,
    pub train_fraction:   f64,
    pub seed:             u64,
    pub num_workers:      usize,
    pub shuffle_val:      bool,

    // ── Model ──
    pub hidden_size:      usize,
    pub num_layers:       usize,
    pub head_hidden_size: usize,
    pub dropout:          f64,
    pub cell:             CellType,

    // ── Numerics + placement ──
    pub grad_clip:        Option<f32>,
    pub nan_policy:       NanPolicy,
    /// Accelerator indices; empty means CPU
    pub devices:          Vec<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:        "data/xf500_body_depth_txt".to_string(),
            label_path:       "data/dictionary.txt".to_string(),
            model_dir:        "models".to_string(),
            log_dir:          "log".to_string(),
            runs_dir:         "runs".to_string(),
            synthetic:        None,
            epochs:           500,
            batch_size:       32,
            learning_rate:    1e-5,
            log_interval:     20,
            num_classes:      100,
            sequence_length:  16,
            selected_joints:  ["HANDLEFT", "HANDRIGHT", "ELBOWLEFT", "ELBOWRIGHT"]
                .map(String::from)
                .to_vec(),
            train_fraction:   0.8,
            seed:             42,
            num_workers:      4,
            shuffle_val:      true,
            hidden_size:      512,
            num_layers:       1,
            head_hidden_size: 512,
            dropout:          0.0,
            cell:             CellType::Gru,
            grad_clip:        None,
            nan_policy:       NanPolicy::Warn,
            devices:          Vec::new(),
        }
    }
}

impl TrainConfig {
    /// Values per frame: (x, y) for each selected joint
    pub fn feature_dim(&self) -> usize {
        2 * self.selected_joints.len()
    }

    pub fn joints(&self) -> Result<JointSelection, TrainError> {
        JointSelection::resolve(&self.selected_joints)
    }

    pub fn model_config(&self) -> SequenceClassifierConfig {
        SequenceClassifierConfig::new(
            self.feature_dim(),
            self.hidden_size,
            self.num_layers,
            self.head_hidden_size,
            self.num_classes,
            self.cell,
        )
        .with_dropout(self.dropout)
    }

    /// Reject any option outside its allowed range.
    pub fn validate(&self) -> Result<(), TrainError> {
        let positive = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("log_interval", self.log_interval),
            ("num_classes", self.num_classes),
            ("sequence_length", self.sequence_length),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(TrainError::config(format!("{name} must be > 0")));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::config(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return Err(TrainError::config(format!(
                "train_fraction must be in (0, 1], got {}",
                self.train_fraction
            )));
        }
        if let Some(clip) = self.grad_clip {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(TrainError::config(format!("grad_clip must be > 0, got {clip}")));
            }
        }
        if self.synthetic == Some(0) {
            return Err(TrainError::config("synthetic must generate at least one sample per class"));
        }
        self.joints()?;
        self.model_config().check()
    }

    fn source(&self) -> Result<Box<dyn SkeletonSource>> {
        if let Some(per_class) = self.synthetic {
            tracing::info!("Generating {} synthetic samples per class", per_class);
            return Ok(Box::new(
                SyntheticSource::new(self.num_classes, per_class, self.sequence_length, self.feature_dim())
                    .with_seed(self.seed)
                    .with_train_fraction(self.train_fraction),
            ));
        }

        tracing::info!("Loading skeleton clips from '{}'", self.data_path);
        let preprocessor = Preprocessor::new(self.sequence_length, self.joints()?, true);
        Ok(Box::new(DirectorySource::new(
            &self.data_path,
            &self.label_path,
            self.num_classes,
            preprocessor,
            self.train_fraction,
            self.seed,
        )?))
    }

    /// Both splits, as datasets
    pub fn load_splits(&self) -> Result<(SkeletonDataset, SkeletonDataset)> {
        let source = self.source()?;
        if source.feature_dim() != self.feature_dim() {
            return Err(TrainError::FeatureDimMismatch {
                expected: self.feature_dim(),
                found:    source.feature_dim(),
            }
            .into());
        }
        let train  = SkeletonDataset::new(source.load(Split::Train)?)?;
        let val    = SkeletonDataset::new(source.load(Split::Validation)?)?;
        Ok((train, val))
    }

    /// `{runs_dir}/slr_skeleton_<timestamp>`
    pub fn run_dir(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(&self.runs_dir).join(format!("slr_skeleton_{stamp}"))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
/// Creating this file in `model_dir` stops a running training job
pub const STOP_FILE: &str = "STOP";

pub struct TrainUseCase {
    config: TrainConfig,
    stop:   StopFlag,
}

impl TrainUseCase {
    /// The run stops between batches once `{model_dir}/STOP` exists.
    pub fn new(config: TrainConfig) -> Self {
        let stop = StopFlag::with_sentinel(PathBuf::from(&config.model_dir).join(STOP_FILE));
        Self { config, stop }
    }

    /// Handle another thread can use to stop the run between batches
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<Vec<EpochReport>> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2 + 3: Load both splits ──────────────────────────────────────
        let (train, val) = cfg.load_splits()?;
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());

        // ── Step 4: Save config for evaluate ──────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.model_dir)?;
        checkpoints.save_config(cfg)?;
        if let Some(stale) = self.stop.sentinel().filter(|p| p.exists()) {
            tracing::warn!("Removing stop file '{}' left by an earlier run", stale.display());
            std::fs::remove_file(stale)?;
        }

        // ── Step 5: Observers ─────────────────────────────────────────────────
        let run_dir   = cfg.run_dir();
        let mut observers = Observers::new().with(LogObserver::new(cfg.epochs));
        match MetricsLogger::new(&run_dir) {
            Ok(metrics) => {
                tracing::info!("Writing metrics to '{}'", run_dir.display());
                observers = observers.with(metrics);
            }
            Err(e) => tracing::warn!("Metrics disabled: {e:#}"),
        }
        tracing::debug!("{} observers attached", observers.len());

        // ── Step 6: Train on the selected backend ─────────────────────────────
        backend::fit(cfg, train, val, checkpoints, observers, self.stop.clone())
    }
}

// ─── Backend selection ────────────────────────────────────────────────────────
// Accelerators come from the `wgpu` feature. Without it, or without
// any requested device, training runs on the CPU backend; a missing
// accelerator is never fatal.
mod backend {
    use super::*;
    use crate::ml::CpuBackend;
    use burn::backend::ndarray::NdArrayDevice;

    fn fit_on<B: burn::tensor::backend::AutodiffBackend>(
        cfg:         &TrainConfig,
        devices:     &[B::Device],
        train:       SkeletonDataset,
        val:         SkeletonDataset,
        checkpoints: CheckpointManager,
        observers:   Observers,
        stop:        StopFlag,
    ) -> Result<Vec<EpochReport>> {
        Trainer::<B>::new(cfg, devices, checkpoints, observers, stop)?.fit(train, val)
    }

    fn fit_on_cpu(
        cfg:         &TrainConfig,
        train:       SkeletonDataset,
        val:         SkeletonDataset,
        checkpoints: CheckpointManager,
        observers:   Observers,
        stop:        StopFlag,
    ) -> Result<Vec<EpochReport>> {
        fit_on::<CpuBackend>(cfg, &[NdArrayDevice::Cpu], train, val, checkpoints, observers, stop)
    }

    #[cfg(feature = "wgpu")]
    pub fn fit(
        cfg:         &TrainConfig,
        train:       SkeletonDataset,
        val:         SkeletonDataset,
        checkpoints: CheckpointManager,
        observers:   Observers,
        stop:        StopFlag,
    ) -> Result<Vec<EpochReport>> {
        use crate::ml::{placement::usable_devices, GpuBackend};
        use burn::backend::wgpu::WgpuDevice;

        if cfg.devices.is_empty() {
            tracing::info!("No accelerator requested; training on CPU");
            return fit_on_cpu(cfg, train, val, checkpoints, observers, stop);
        }
        let requested = cfg.devices.iter().map(|&i| WgpuDevice::DiscreteGpu(i)).collect();
        let devices   = usable_devices::<GpuBackend>(requested);
        if devices.is_empty() {
            tracing::warn!("None of the devices {:?} is available; falling back to CPU", cfg.devices);
            return fit_on_cpu(cfg, train, val, checkpoints, observers, stop);
        }
        if devices.len() > 1 {
            tracing::info!("Using {} GPUs", devices.len());
        }
        fit_on::<GpuBackend>(cfg, &devices, train, val, checkpoints, observers, stop)
    }

    #[cfg(not(feature = "wgpu"))]
    pub fn fit(
        cfg:         &TrainConfig,
        train:       SkeletonDataset,
        val:         SkeletonDataset,
        checkpoints: CheckpointManager,
        observers:   Observers,
        stop:        StopFlag,
    ) -> Result<Vec<EpochReport>> {
        if !cfg.devices.is_empty() {
            tracing::warn!(
                "Devices {:?} requested but accelerator support is not compiled in (feature `wgpu`); falling back to CPU",
                cfg.devices
            );
        }
        fit_on_cpu(cfg, train, val, checkpoints, observers, stop)
    }
}
