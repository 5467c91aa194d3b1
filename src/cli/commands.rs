// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their configurable flags. Defaults reproduce the reference
// training run: GRU, 500 epochs, batch 32, lr 1e-5, 16 frames,
// both hands and elbows.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{model::CellType, runner::NanPolicy};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the skeleton sequence classifier
    Train(TrainArgs),

    /// Score a saved checkpoint on the validation split
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Root folder with one sub-folder of skeleton .txt clips per class
    #[arg(long, default_value = "data/xf500_body_depth_txt")]
    pub data_path: String,

    /// Label dictionary, one "<id> <word>" per line
    #[arg(long, default_value = "data/dictionary.txt")]
    pub label_path: String,

    /// Where checkpoints and train_config.json are written
    #[arg(long, default_value = "models")]
    pub model_dir: String,

    /// Directory for the per-run log file
    #[arg(long, default_value = "log")]
    pub log_dir: String,

    /// Directory for per-run metric series
    #[arg(long, default_value = "runs")]
    pub runs_dir: String,

    /// Train on N generated samples per class instead of --data-path
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    #[arg(long, default_value_t = 500)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-5)]
    pub learning_rate: f64,

    /// Log training progress every N batches
    #[arg(long, default_value_t = 20)]
    pub log_interval: usize,

    #[arg(long, default_value_t = 100)]
    pub num_classes: usize,

    /// Frames per sample after resampling
    #[arg(long, default_value_t = 16)]
    pub sequence_length: usize,

    /// Comma-separated joint names
    #[arg(long, value_delimiter = ',', default_value = "HANDLEFT,HANDRIGHT,ELBOWLEFT,ELBOWRIGHT")]
    pub selected_joints: Vec<String>,

    /// Share of each class's clips used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Background batch-prefetch threads (0 = load inline)
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Keep the validation split in file order
    #[arg(long)]
    pub no_shuffle_val: bool,

    #[arg(long, default_value_t = 512)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    /// Width of the classifier head's hidden layer
    #[arg(long, default_value_t = 512)]
    pub head_hidden_size: usize,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    #[arg(long, value_enum, default_value_t = CellType::Gru)]
    pub cell: CellType,

    /// Clip the global gradient norm to this value
    #[arg(long, value_name = "MAX_NORM")]
    pub grad_clip: Option<f32>,

    /// Handling of batches with a NaN/Inf loss
    #[arg(long, value_enum, default_value_t = NanPolicy::Warn)]
    pub nan_policy: NanPolicy,

    /// Accelerator indices; more than one replicates each batch
    #[arg(long, env = "SLR_VISIBLE_DEVICES", value_delimiter = ',')]
    pub devices: Vec<usize>,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:        a.data_path,
            label_path:       a.label_path,
            model_dir:        a.model_dir,
            log_dir:          a.log_dir,
            runs_dir:         a.runs_dir,
            synthetic:        a.synthetic,
            epochs:           a.epochs,
            batch_size:       a.batch_size,
            learning_rate:    a.learning_rate,
            log_interval:     a.log_interval,
            num_classes:      a.num_classes,
            sequence_length:  a.sequence_length,
            selected_joints:  a.selected_joints,
            train_fraction:   a.train_fraction,
            seed:             a.seed,
            num_workers:      a.num_workers,
            shuffle_val:      !a.no_shuffle_val,
            hidden_size:      a.hidden_size,
            num_layers:       a.num_layers,
            head_hidden_size: a.head_hidden_size,
            dropout:          a.dropout,
            cell:             a.cell,
            grad_clip:        a.grad_clip,
            nan_policy:       a.nan_policy,
            devices:          a.devices,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Model directory written by `train`
    #[arg(long, default_value = "models")]
    pub model_dir: String,

    /// 1-indexed epoch to load (default: newest checkpoint)
    #[arg(long)]
    pub epoch: Option<usize>,

    /// Read clips from here instead of the training run's data path
    #[arg(long)]
    pub data_path: Option<String>,

    /// Also write the log to this directory
    #[arg(long)]
    pub log_dir: Option<String>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use crate::cli::Cli;
    use crate::application::train_use_case::TrainConfig;
    use super::Commands;
    use clap::Parser;

    fn train_config(args: &[&str]) -> TrainConfig {
        let argv = ["slr-skeleton", "train"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Train(a) => a.into(),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let from_cli = serde_json::to_value(train_config(&[])).unwrap();
        let mut expected = serde_json::to_value(TrainConfig::default()).unwrap();
        // SLR_VISIBLE_DEVICES may be set in the environment
        expected["devices"] = from_cli["devices"].clone();
        assert_eq!(from_cli, expected);
    }

    #[test]
    fn test_lists_and_enums_parse() {
        let cfg = train_config(&[
            "--selected-joints", "HANDLEFT,HANDRIGHT",
            "--devices", "0,1",
            "--cell", "lstm",
            "--nan-policy", "skip-step",
            "--no-shuffle-val",
        ]);
        assert_eq!(cfg.selected_joints, vec!["HANDLEFT", "HANDRIGHT"]);
        assert_eq!(cfg.devices, vec![0, 1]);
        assert_eq!(cfg.cell, crate::ml::model::CellType::Lstm);
        assert_eq!(cfg.nan_policy, crate::ml::runner::NanPolicy::SkipStep);
        assert!(!cfg.shuffle_val);
    }

    #[test]
    fn test_evaluate_args() {
        let cli = Cli::try_parse_from(["slr-skeleton", "evaluate", "--model-dir", "m", "--epoch", "3"]).unwrap();
        match cli.command {
            Commands::Evaluate(a) => {
                assert_eq!(a.model_dir, "m");
                assert_eq!(a.epoch, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
