// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Persists classifier weights once per completed epoch and the
// run configuration once per run.
//
// Directory layout:
//   {model_dir}/
//     train_config.json              ← architecture + hyperparameters
//     slr_skeleton_epoch001.pth      ← weights after epoch 1
//     slr_skeleton_epoch002.pth
//     ...
//
// The epoch number is 1-indexed and zero-padded to three digits,
// so a plain sorted listing is chronological and the last entry
// is the newest checkpoint.
//
// Content: Burn's named MessagePack record of the model only.
// No optimizer moments, no epoch counter.
//
// Writes go to `<name>.tmp` first and are renamed into place, so a
// failed write never leaves a truncated .pth behind and never
// touches an earlier epoch's file.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::TrainError;
use crate::ml::model::SequenceClassifier;

const CHECKPOINT_PREFIX: &str = "slr_skeleton_epoch";
const CHECKPOINT_EXT:    &str = "pth";
const CONFIG_FILE:       &str = "train_config.json";

type WeightsRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// File name of the checkpoint written after zero-based `epoch`
pub fn checkpoint_name(epoch: usize) -> String {
    format!("{CHECKPOINT_PREFIX}{:03}.{CHECKPOINT_EXT}", epoch + 1)
}

/// Zero-based epoch encoded in a checkpoint file name
pub fn epoch_of(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let n: usize = stem.strip_prefix(CHECKPOINT_PREFIX)?.parse().ok()?;
    n.checked_sub(1)
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(checkpoint_name(epoch))
    }

    /// Write the weights of zero-based `epoch`; returns the final path.
    pub fn save_model<B: Backend>(&self, model: &SequenceClassifier<B>, epoch: usize) -> Result<PathBuf> {
        let path = self.path_for(epoch);
        let tmp  = path.with_extension(format!("{CHECKPOINT_EXT}.tmp"));

        let bytes = WeightsRecorder::default()
            .record(model.clone().into_record(), ())
            .map_err(|e| TrainError::Checkpoint(format!("cannot serialise epoch {}: {e}", epoch + 1)))?;

        fs::write(&tmp, &bytes)
            .map_err(|e| TrainError::Checkpoint(format!("cannot write '{}': {e}", tmp.display())))?;

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(TrainError::Checkpoint(format!(
                "cannot move checkpoint into '{}': {e}",
                path.display()
            ))
            .into());
        }

        tracing::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Restore weights into `model`, which must have the saved architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  SequenceClassifier<B>,
        path:   &Path,
        device: &B::Device,
    ) -> Result<SequenceClassifier<B>> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        let record = WeightsRecorder::default()
            .load(bytes, device)
            .map_err(|e| TrainError::Checkpoint(format!("cannot decode '{}': {e}", path.display())))?;

        Ok(model.load_record(record))
    }

    /// Every checkpoint in the directory, oldest first
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot list '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_checkpoint(p))
            .collect();
        found.sort();
        Ok(found)
    }

    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.pop())
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run configuration to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Run 'train' with this model directory first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}

fn is_checkpoint(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == CHECKPOINT_EXT)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(CHECKPOINT_PREFIX))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{CellType, SequenceClassifierConfig};
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    type B = NdArray;

    fn model() -> SequenceClassifier<B> {
        SequenceClassifierConfig::new(4, 6, 1, 5, 3, CellType::Lstm).init::<B>(&NdArrayDevice::Cpu)
    }

    #[test]
    fn test_names_sort_in_epoch_order() {
        let names: Vec<String> = (0..5).map(checkpoint_name).collect();
        assert_eq!(names[0], "slr_skeleton_epoch001.pth");
        assert_eq!(names[4], "slr_skeleton_epoch005.pth");

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
        assert!(checkpoint_name(9) < checkpoint_name(10));
        assert_eq!(epoch_of(Path::new("m/slr_skeleton_epoch042.pth")), Some(41));
        assert_eq!(epoch_of(Path::new("m/other.pth")), None);
    }

    #[test]
    fn test_save_then_load_restores_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let saved  = model();
        let path   = ckpt.save_model(&saved, 0).unwrap();
        assert_eq!(path, dir.path().join("slr_skeleton_epoch001.pth"));
        assert!(!dir.path().join("slr_skeleton_epoch001.pth.tmp").exists());

        let restored = ckpt.load_model(model(), &path, &NdArrayDevice::Cpu).unwrap();
        let x = Tensor::<B, 3>::ones([2, 3, 4], &NdArrayDevice::Cpu);
        let a: Vec<f32> = saved.forward(x.clone()).into_data().iter::<f32>().collect();
        let b: Vec<f32> = restored.forward(x).into_data().iter::<f32>().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_latest_is_highest_epoch() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest().unwrap().is_none());

        let m = model();
        for epoch in [2, 0, 11] {
            ckpt.save_model(&m, epoch).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(ckpt.list().unwrap().len(), 3);
        assert_eq!(ckpt.latest().unwrap(), Some(dir.path().join("slr_skeleton_epoch012.pth")));
    }

    #[test]
    fn test_failed_write_keeps_earlier_checkpoints() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let m    = model();
        let first = ckpt.save_model(&m, 0).unwrap();
        let before = fs::read(&first).unwrap();

        // a directory squatting on the target name makes the rename fail
        fs::create_dir(ckpt.path_for(1)).unwrap();
        assert!(ckpt.save_model(&m, 1).is_err());

        assert_eq!(fs::read(&first).unwrap(), before);
        assert!(!dir.path().join("slr_skeleton_epoch002.pth.tmp").exists());
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.load_config().is_err());

        let cfg = TrainConfig { epochs: 7, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        assert_eq!(ckpt.load_config().unwrap().epochs, 7);
    }
}
