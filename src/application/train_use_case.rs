// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Wires the harness together for the synthetic regression task
// and drives it to the configured iteration count:
//
//   Step 1: Generate samples              (Layer 4 - data)
//   Step 2: Split train/validation        (Layer 4 - data)
//   Step 3: Record the resolved config    (Layer 2 - config)
//   Step 4: Build loaders + perpetual     (Layer 4 - data)
//   Step 5: Checkpointer + metric sink    (Layer 6 - infra)
//   Step 6: Build or restore model set    (Layer 5 - ml)
//   Step 7: Step / validate until done    (Layer 5 - ml)
//
// A run with a start iteration above zero is a resume: the model
// set and optimizer state come back from the best checkpoint of
// the same phase, and a missing checkpoint is an error.
//
// Everything a run writes lands in the serialization directory:
//
//   <dir>/config.json
//   <dir>/scalars.csv
//   <dir>/<phase>_<iteration>.mpk.gz
//   <dir>/<phase>_<iteration>_optim.mpk.gz
//   <dir>/<phase>_best.json

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{LearningRate, Optimizer},
    tensor::backend::AutodiffBackend,
};
use std::path::{Path, PathBuf};

use crate::application::config::{HarnessConfig, ScheduleConfig};
use crate::data::{
    perpetual::PerpetualBatches,
    splitter::split_train_val,
    synthetic::{generate_linear, regression_loader, LoaderOptions, NUM_FEATURES},
};
use crate::infra::{
    checkpoint::{BestCheckpoint, CheckpointManager},
    metrics::CsvMetricSink,
};
use crate::ml::{
    compute::MeanLoss,
    model::{Regressor, RegressorConfig},
    optim::adam_config,
    trainer::Trainer,
    validator::{RegressionValidator, Validator},
};

pub const DEFAULT_NUM_SAMPLES: usize = 1024;
const TRAIN_FRACTION: f64 = 0.8;
const LOADER_WORKERS: usize = 1;

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// Iteration counter when the schedule stopped
    pub final_iteration: u64,

    /// Validations run by this invocation
    pub validations:     usize,

    /// Best checkpoint on disk for the phase, if any
    pub best:            Option<BestCheckpoint>,

    /// Learning rate after the last scheduler step
    pub final_lr:        LearningRate,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    /// Resolved, not yet validated, configuration
    config:            HarnessConfig,

    /// Where config, scalars and checkpoints are written
    serialization_dir: PathBuf,

    /// 0 for a fresh run; otherwise resume from the best checkpoint
    start_iteration:   u64,

    /// Synthetic samples generated before the split
    num_samples:       usize,
}

impl TrainUseCase {
    pub fn new(config: HarnessConfig, serialization_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            serialization_dir: serialization_dir.into(),
            start_iteration:   0,
            num_samples:       DEFAULT_NUM_SAMPLES,
        }
    }

    /// Resume counting from `iteration`, restoring the best checkpoint.
    pub fn with_start_iteration(mut self, iteration: u64) -> Self {
        self.start_iteration = iteration;
        self
    }

    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    pub fn serialization_dir(&self) -> &Path {
        &self.serialization_dir
    }

    /// Run the whole pipeline on `device`.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;
        let dir = &self.serialization_dir;

        // ── Step 1 + 2: data ─────────────────────────────────────────────────
        let samples = generate_linear(self.num_samples, cfg.random_seed);
        let (train_samples, val_samples) = split_train_val(samples, TRAIN_FRACTION, cfg.random_seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 3: config next to the checkpoints ───────────────────────────
        cfg.save(dir)?;

        // ── Step 4: loaders ──────────────────────────────────────────────────
        // Training reshuffles on every pass; validation keeps a fixed order
        // on the inner backend.
        let train_loader = regression_loader::<B>(
            train_samples,
            LoaderOptions {
                batch_size:  cfg.schedule.batch_size,
                shuffle:     Some(cfg.random_seed),
                num_workers: LOADER_WORKERS,
            },
            &device,
        );
        let val_loader = regression_loader::<B::InnerBackend>(
            val_samples,
            LoaderOptions {
                batch_size:  cfg.schedule.batch_size,
                shuffle:     None,
                num_workers: LOADER_WORKERS,
            },
            &device,
        );
        let batches = PerpetualBatches::new(train_loader, &device)?;
        tracing::info!("{} training items per pass", batches.num_items());

        // ── Step 5: persistence ──────────────────────────────────────────────
        let checkpointer = CheckpointManager::new(dir, cfg.phase.as_str())?;
        let sink         = CsvMetricSink::new(dir)?;

        // ── Step 6: model set + optimizer ────────────────────────────────────
        let mut model     = RegressorConfig::new(NUM_FEATURES).init::<B>(&device);
        let mut optimizer = adam_config(&cfg.optim).init::<B, Regressor<B>>();

        if self.start_iteration > 0 {
            let best = checkpointer.best().with_context(|| {
                format!(
                    "Cannot resume phase '{}' at iteration {}: no best checkpoint in '{}'",
                    cfg.phase,
                    self.start_iteration,
                    dir.display()
                )
            })?;
            tracing::info!(
                "Resuming at iteration {} from best checkpoint {} (metric {:.6})",
                self.start_iteration,
                best.iteration,
                best.metric
            );
            model     = checkpointer.load_best::<B, _>(model, &device)?;
            optimizer = checkpointer.load_best_optimizer::<B, Regressor<B>, _>(optimizer, &device)?;
        }

        let mut trainer = Trainer::new(&cfg.optim, batches, model, optimizer, MeanLoss, checkpointer, sink)?
            .with_start_iteration(self.start_iteration);
        let mut validator = RegressionValidator::<B>::new(val_loader)?;

        // ── Step 7: drive ────────────────────────────────────────────────────
        tracing::info!(
            "Training phase '{}' from iteration {} to {}",
            cfg.phase,
            self.start_iteration,
            cfg.schedule.num_iterations
        );
        let validations = run_schedule(&mut trainer, &mut validator, &cfg.schedule)?;

        let summary = TrainSummary {
            final_iteration: trainer.iteration(),
            validations,
            best:            CheckpointManager::read_best(dir, &cfg.phase)?,
            final_lr:        trainer.learning_rate(),
        };
        tracing::info!(
            "Finished at iteration {} after {} validations (lr {:.3e})",
            summary.final_iteration,
            summary.validations,
            summary.final_lr
        );
        Ok(summary)
    }
}

/// Step until `num_iterations`, validating whenever the iteration
/// counter lands on a multiple of `checkpoint_every`. Returns the
/// number of validations run.
pub fn run_schedule<B, M, O, T, V>(
    trainer:   &mut Trainer<B, M, O, T>,
    validator: &mut V,
    schedule:  &ScheduleConfig,
) -> Result<usize>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
    T: Send + 'static,
    V: Validator<B, M>,
{
    let mut validations = 0;

    while trainer.iteration() < schedule.num_iterations {
        let outputs = trainer.step(None)?;
        if let Some(loss) = outputs.scalar("loss") {
            tracing::debug!(
                "iteration {} (pass {}): loss={:.6}",
                trainer.iteration(),
                trainer.batches().passes(),
                loss
            );
        }

        if trainer.iteration() % schedule.checkpoint_every == 0 {
            let metrics = validator.validate(&trainer.models().valid())?;
            let outcome = trainer.after_validation(metrics, None)?;
            if outcome.lr_reduced {
                tracing::debug!("No gain over best {:.6}; rate now {:.3e}", trainer.scheduler().best(), outcome.lr);
            }
            validations += 1;
        }
    }

    Ok(validations)
}
