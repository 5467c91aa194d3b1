// ============================================================
// Layer 4 - Skeleton Directory Loader
// ============================================================
// Reads the isolated-sign skeleton corpus from disk.
//
// Expected layout:
//
//   dictionary.txt           ← one class per line: "<id> <word>"
//   data/
//     000000/                ← class 0
//       P01_01_00_0.txt      ← one sample (clip) per file
//       P01_01_00_1.txt
//     000001/                ← class 1
//       ...
//
// Sample files hold one frame per line, 50 whitespace-separated
// numbers: (x, y) for each of the 25 sensor joints.
//
// The train/validation partition is made per class with a seeded
// shuffle, so both splits contain every class and the partition
// is identical across runs with the same seed.
//
// Unreadable sample files are skipped with a warning; a missing
// data or dictionary path is an error.
//
// Reference: Rust Book §9 (Error Handling), §12 (I/O)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::preprocessor::Preprocessor;
use crate::data::splitter::split_train_val;
use crate::domain::joints::RAW_FRAME_WIDTH;
use crate::domain::sample::SkeletonSample;
use crate::domain::traits::{SkeletonSource, Split};

/// One entry of the label dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    pub id:   usize,
    pub word: String,
}

/// Parse the label dictionary: "<id><whitespace><word>" per line.
pub fn load_label_dictionary(path: impl AsRef<Path>) -> Result<Vec<ClassLabel>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read label dictionary '{}'", path.display()))?;

    let mut labels = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (id, word) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let id = id.parse::<usize>().with_context(|| {
            format!("{}:{}: bad class id '{}'", path.display(), line_no + 1, id)
        })?;
        labels.push(ClassLabel { id, word: word.trim().to_string() });
    }
    Ok(labels)
}

/// Loads per-class folders of joint text files.
pub struct DirectorySource {
    data_path:      PathBuf,
    num_classes:    usize,
    preprocessor:   Preprocessor,
    train_fraction: f64,
    seed:           u64,
}

impl DirectorySource {
    pub fn new(
        data_path:      impl Into<PathBuf>,
        label_path:     impl AsRef<Path>,
        num_classes:    usize,
        preprocessor:   Preprocessor,
        train_fraction: f64,
        seed:           u64,
    ) -> Result<Self> {
        let data_path = data_path.into();
        if !data_path.is_dir() {
            anyhow::bail!("Data directory '{}' does not exist", data_path.display());
        }

        let labels = load_label_dictionary(label_path)?;
        if labels.len() < num_classes {
            tracing::warn!(
                "Label dictionary lists {} classes but {} are configured",
                labels.len(),
                num_classes
            );
        }
        tracing::debug!("Loaded {} dictionary entries", labels.len());

        Ok(Self { data_path, num_classes, preprocessor, train_fraction, seed })
    }

    /// Sorted sample files of one class folder
    fn class_files(&self, class_id: usize) -> Result<Vec<PathBuf>> {
        let dir = self.data_path.join(format!("{class_id:06}"));
        if !dir.is_dir() {
            tracing::warn!("No folder for class {} at '{}'", class_id, dir.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_sample(&self, path: &Path, label: usize) -> Result<SkeletonSample> {
        let frames = read_raw_frames(path)?;
        let seq    = self
            .preprocessor
            .sequence(&frames)
            .with_context(|| format!("'{}' has no frames", path.display()))?;
        Ok(SkeletonSample::new(
            seq,
            self.preprocessor.seq_len(),
            self.preprocessor.feature_dim(),
            label,
        ))
    }
}

impl SkeletonSource for DirectorySource {
    fn load(&self, split: Split) -> Result<Vec<SkeletonSample>> {
        let mut samples = Vec::new();

        for class_id in 0..self.num_classes {
            let files = self.class_files(class_id)?;
            let class_seed   = self.seed.wrapping_add(class_id as u64);
            let (train, val) = split_train_val(files, self.train_fraction, class_seed);
            let chosen       = if split.is_train() { train } else { val };

            for path in chosen {
                match self.load_sample(&path, class_id) {
                    Ok(sample) => samples.push(sample),
                    Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
                }
            }
        }

        tracing::info!("Loaded {} {} samples", samples.len(), split.as_str());
        Ok(samples)
    }

    fn feature_dim(&self) -> usize {
        self.preprocessor.feature_dim()
    }
}

/// Parse one sample file into raw 50-value frames.
fn read_raw_frames(path: &Path) -> Result<Vec<Vec<f32>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let mut frames = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let frame = line
            .split_whitespace()
            .map(str::parse::<f32>)
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("line {}: not a list of numbers", line_no + 1))?;
        if frame.len() != RAW_FRAME_WIDTH {
            anyhow::bail!(
                "line {}: expected {} values, found {}",
                line_no + 1,
                RAW_FRAME_WIDTH,
                frame.len()
            );
        }
        frames.push(frame);
    }
    Ok(frames)
}
