// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands:
//
//   train   run the harness on the synthetic regression task
//   config  print the config a `train` would run with
//
// Both resolve their config the same way:
//
//   defaults → --config file → --config-override → --random-seed

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    config::{ConfigDiagnostic, HarnessConfig},
    train_use_case::DEFAULT_NUM_SAMPLES,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train until the configured iteration count
    Train(TrainArgs),

    /// Print the resolved config without training
    Config(ConfigArgs),
}

/// Compute backend for the run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// ndarray on the CPU
    Cpu,
    /// wgpu on the default GPU adapter
    Wgpu,
}

/// Where the config comes from.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// JSON config file; defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON object of dotted-key overrides, e.g. '{"optim.lr_initial": 0.01}'
    #[arg(long, default_value = "{}")]
    pub config_override: String,

    /// Replaces `random_seed` from the config
    #[arg(long)]
    pub random_seed: Option<u64>,
}

impl ConfigArgs {
    /// Build the effective config and collect override diagnostics.
    pub fn resolve(&self) -> Result<(HarnessConfig, Vec<ConfigDiagnostic>)> {
        let mut cfg = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None       => HarnessConfig::default(),
        };

        let diagnostics = cfg.apply_override_str(&self.config_override)?;
        if let Some(seed) = self.random_seed {
            cfg.random_seed = seed;
        }
        Ok((cfg, diagnostics))
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory for config.json, scalars.csv and checkpoints
    #[arg(long, default_value = "checkpoints/experiment")]
    pub serialization_dir: PathBuf,

    /// Resume at this iteration from the phase's best checkpoint (0 = fresh run)
    #[arg(long, default_value_t = 0)]
    pub start_iteration: u64,

    /// Number of synthetic samples before the train/validation split
    #[arg(long, default_value_t = DEFAULT_NUM_SAMPLES)]
    pub num_samples: usize,

    /// Compute backend for training and validation
    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,
}
