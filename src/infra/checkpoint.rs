// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Keeps the best-performing snapshot of the model set and its
// optimizer, judged by a "higher is better" metric.
//
// On every new best metric, for phase prefix P and iteration N:
//   1. P_N.mpk.gz        — model record  (burn CompactRecorder)
//   2. P_N_optim.mpk.gz  — optimizer record
//   3. P_best.json       — {"iteration": N, "metric": ...}
//
// Non-improving metrics write nothing. The pointer is read back
// on construction, so a resumed run does not replace a better
// snapshot with a worse one.
//
// File layout:
//   checkpoints/
//     program_prior_1500.mpk.gz
//     program_prior_1500_optim.mpk.gz
//     program_prior_best.json

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

// ─── Checkpointer ─────────────────────────────────────────────────────────────
/// Persists trainer state keyed by a "higher is better" metric.
pub trait Checkpointer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    /// Returns true when `metric` is a new best and state was saved.
    fn step(&mut self, metric: f64, iteration: u64, models: &M, optimizer: &O) -> Result<bool>;
}

/// Contents of `<prefix>_best.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    /// Iteration the snapshot was taken at
    pub iteration: u64,

    /// Aggregate metric, higher is better
    pub metric:    f64,
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
pub struct CheckpointManager {
    dir:    PathBuf,

    /// Phase name leading every file name
    prefix: String,

    /// Mirrors `<prefix>_best.json`
    best:   Option<BestCheckpoint>,
}

impl CheckpointManager {
    /// Create the directory if needed and pick up an existing best pointer.
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;

        let prefix = prefix.into();
        let best   = Self::read_best(&dir, &prefix)?;
        if let Some(best) = &best {
            tracing::info!(
                "Resuming best checkpoint: iteration {} (metric {:.6})",
                best.iteration,
                best.metric
            );
        }

        Ok(Self { dir, prefix, best })
    }

    /// Read `<dir>/<prefix>_best.json` without taking ownership of the directory.
    pub fn read_best(dir: impl AsRef<Path>, prefix: &str) -> Result<Option<BestCheckpoint>> {
        let pointer = pointer_path(dir.as_ref(), prefix);
        if !pointer.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&pointer)
            .with_context(|| format!("Cannot read '{}'", pointer.display()))?;
        let best = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt checkpoint pointer '{}'", pointer.display()))?;
        Ok(Some(best))
    }

    pub fn best(&self) -> Option<&BestCheckpoint> {
        self.best.as_ref()
    }

    /// Path of the model record for `iteration`, without extension.
    pub fn model_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{}_{iteration}", self.prefix))
    }

    pub fn optimizer_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{}_{iteration}_optim", self.prefix))
    }

    fn pointer_path(&self) -> PathBuf {
        pointer_path(&self.dir, &self.prefix)
    }

    fn is_improvement(&self, metric: f64) -> bool {
        self.best.as_ref().map_or(true, |b| metric > b.metric)
    }

    /// Save model and optimizer records for `iteration` and move the best pointer.
    pub fn save<B, M, O>(&mut self, metric: f64, iteration: u64, models: &M, optimizer: &O) -> Result<()>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let recorder = CompactRecorder::new();

        let model_path = self.model_path(iteration);
        Recorder::<B>::record(&recorder, models.clone().into_record(), model_path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", model_path.display()))?;

        let optim_path = self.optimizer_path(iteration);
        Recorder::<B>::record(&recorder, optimizer.to_record(), optim_path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", optim_path.display()))?;

        let best    = BestCheckpoint { iteration, metric };
        let pointer = self.pointer_path();
        fs::write(&pointer, serde_json::to_string_pretty(&best)?)
            .with_context(|| format!("Failed to write '{}'", pointer.display()))?;

        tracing::info!("Saved best checkpoint: iteration {} (metric {:.6})", iteration, metric);
        self.best = Some(best);
        Ok(())
    }

    /// Restore the best model record into `model`.
    pub fn load_best<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let best = self.best.as_ref().context("No best checkpoint has been saved yet")?;
        let path = self.model_path(best.iteration);

        tracing::info!("Loading checkpoint from iteration {}", best.iteration);
        let record: M::Record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

        Ok(model.load_record(record))
    }

    /// Restore the optimizer state saved with the best model.
    pub fn load_best_optimizer<B, M, O>(&self, optimizer: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let best = self.best.as_ref().context("No best checkpoint has been saved yet")?;
        let path = self.optimizer_path(best.iteration);

        let record: O::Record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;

        Ok(optimizer.load_record(record))
    }
}

fn pointer_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}_best.json"))
}

impl<B, M, O> Checkpointer<B, M, O> for CheckpointManager
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn step(&mut self, metric: f64, iteration: u64, models: &M, optimizer: &O) -> Result<bool> {
        if !self.is_improvement(metric) {
            tracing::debug!("Metric {:.6} at iteration {} is not a new best", metric, iteration);
            return Ok(false);
        }
        self.save::<B, M, O>(metric, iteration, models, optimizer)?;
        Ok(true)
    }
}
