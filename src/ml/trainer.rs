// ============================================================
// Layer 5 — Generic Trainer
// ============================================================
// Iteration-indexed training around a model set:
//
//   step()              one optimizer update on the next batch
//   after_validation()  react to freshly computed val metrics
//
// One step:
//   1. next batch from the perpetual source (already on device)
//   2. ComputeStep: forward, scalar loss, backward → gradients
//   3. optimizer update at the scheduler's current rate
//   4. log every output under "train/<key>"
//   5. iteration = override or iteration + 1
//
// After validation:
//   1. optional iteration override
//   2. checkpointer sees the aggregate metric (keeps the best)
//   3. plateau scheduler sees the aggregate metric
//   4. log "train/lr" and every "val/metrics/<model>/<metric>"
//
// The model set is any burn module; a struct with one field per
// model gives a joint optimizer over all of their parameters.
// Validators get `models().valid()`, which shares parameters
// with the trainer without touching its state.

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, LearningRate, Optimizer},
    tensor::backend::AutodiffBackend,
};

use crate::application::config::OptimConfig;
use crate::data::perpetual::PerpetualBatches;
use crate::domain::{
    outputs::{OutputValue, StepOutput},
    traits::MetricSink,
    validation::ValidationMetrics,
};
use crate::infra::checkpoint::Checkpointer;
use crate::ml::{compute::ComputeStep, scheduler::PlateauScheduler};

/// What `after_validation` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOutcome {
    /// The checkpointer stored this state as the new best.
    pub is_best:    bool,

    /// Learning rate after scheduling.
    pub lr:         LearningRate,

    /// The scheduler reduced the rate on this validation.
    pub lr_reduced: bool,
}

/// Generic over the backend `B`, the model set `M`, its
/// optimizer `O` and the batch type `T` the loader produces.
pub struct Trainer<B, M, O, T>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
    T: Send + 'static,
{
    batches:      PerpetualBatches<T>,
    models:       M,
    optimizer:    O,
    compute:      Box<dyn ComputeStep<B, M, T>>,
    scheduler:    PlateauScheduler,
    checkpointer: Box<dyn Checkpointer<B, M, O>>,
    sink:         Box<dyn MetricSink>,
    iteration:    u64,
}

impl<B, M, O, T> Trainer<B, M, O, T>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
    T: Send + 'static,
{
    /// Wire a trainer together. The plateau scheduler is built from
    /// `optim` (initial rate, gamma, patience, floor); the iteration counter
    /// starts at 0, see `with_start_iteration`.
    pub fn new<C, K, L>(
        optim:        &OptimConfig,
        batches:      PerpetualBatches<T>,
        models:       M,
        optimizer:    O,
        compute:      C,
        checkpointer: K,
        sink:         L,
    ) -> Result<Self>
    where
        C: ComputeStep<B, M, T> + 'static,
        K: Checkpointer<B, M, O> + 'static,
        L: MetricSink + 'static,
    {
        Ok(Self {
            batches,
            models,
            optimizer,
            compute:      Box::new(compute),
            scheduler:    PlateauScheduler::from_config(optim)?,
            checkpointer: Box::new(checkpointer),
            sink:         Box::new(sink),
            iteration:    0,
        })
    }

    pub fn with_start_iteration(mut self, iteration: u64) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn models(&self) -> &M {
        &self.models
    }

    pub fn scheduler(&self) -> &PlateauScheduler {
        &self.scheduler
    }

    pub fn learning_rate(&self) -> LearningRate {
        self.scheduler.lr()
    }

    pub fn batches(&self) -> &PerpetualBatches<T> {
        &self.batches
    }

    /// Advance training by one batch.
    pub fn step(&mut self, iteration: Option<u64>) -> Result<StepOutput> {
        // Gradients come fresh out of every backward pass; nothing
        // carries over from the previous step.
        let batch    = self.batches.next_batch()?;
        let computed = self.compute.compute(&self.models, batch)?;

        let grads   = GradientsParams::from_grads(computed.gradients, &self.models);
        self.models = self
            .optimizer
            .step(self.scheduler.lr(), self.models.clone(), grads);

        self.log_outputs(&computed.outputs)?;
        self.iteration = iteration.unwrap_or(self.iteration + 1);

        Ok(computed.outputs)
    }

    fn log_outputs(&mut self, outputs: &StepOutput) -> Result<()> {
        for (key, value) in outputs.iter() {
            let tag = format!("train/{key}");
            match value {
                OutputValue::Scalar(v)    => self.sink.add_scalar(&tag, *v, self.iteration)?,
                OutputValue::Group(group) => self.sink.add_scalars(&tag, group, self.iteration)?,
            }
        }
        Ok(())
    }

    /// Feed freshly computed validation metrics to the checkpointer,
    /// the scheduler and the metric sink.
    pub fn after_validation(
        &mut self,
        metrics:   ValidationMetrics,
        iteration: Option<u64>,
    ) -> Result<ValidationOutcome> {
        if let Some(iteration) = iteration {
            self.iteration = iteration;
        }

        let (metric, per_model) = metrics.into_parts();

        let is_best = self
            .checkpointer
            .step(metric, self.iteration, &self.models, &self.optimizer)?;
        let lr_reduced = self.scheduler.step(metric)?;

        let lr = self.scheduler.lr();
        self.sink.add_scalar("train/lr", lr, self.iteration)?;

        for (model_name, values) in &per_model {
            for (metric_name, value) in values {
                self.sink.add_scalar(
                    &format!("val/metrics/{model_name}/{metric_name}"),
                    *value,
                    self.iteration,
                )?;
            }
        }
        self.sink.flush()?;

        tracing::info!(
            "Validation at iteration {}: metric={:.6} best={} lr={:.3e}",
            self.iteration,
            metric,
            is_best,
            lr
        );

        Ok(ValidationOutcome { is_best, lr, lr_reduced })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        batch::TensorBatch,
        synthetic::{generate_linear, regression_loader, LoaderOptions, NUM_FEATURES},
    };
    use crate::infra::{checkpoint::CheckpointManager, metrics::MemorySink};
    use crate::ml::{
        compute::{ComputeFn, Computed, LossModel, MeanLoss},
        model::{Regressor, RegressorConfig},
        optim::adam_config,
    };
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::ElementConversion,
    };
    use serde_json::json;
    use std::{cell::RefCell, rc::Rc};

    type TestBackend = Autodiff<NdArray>;
    type Model       = Regressor<TestBackend>;
    type Batch       = TensorBatch<TestBackend>;

    /// Records every checkpoint call; "best" is a running maximum.
    #[derive(Clone, Default)]
    struct RecordingCheckpointer {
        calls: Rc<RefCell<Vec<(f64, u64)>>>,
    }

    impl<B, M, O> Checkpointer<B, M, O> for RecordingCheckpointer
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        fn step(&mut self, metric: f64, iteration: u64, _models: &M, _optimizer: &O) -> Result<bool> {
            let mut calls = self.calls.borrow_mut();
            let is_best   = calls.iter().all(|(m, _)| metric > *m);
            calls.push((metric, iteration));
            Ok(is_best)
        }
    }

    fn batches(num_batches: usize, batch_size: usize) -> PerpetualBatches<Batch> {
        let device  = Default::default();
        let options = LoaderOptions { batch_size, shuffle: None, num_workers: 0 };
        let loader  = regression_loader::<TestBackend>(generate_linear(num_batches * batch_size, 7), options, &device);
        PerpetualBatches::new(loader, &device).unwrap()
    }

    fn optim_config(lr: f64, patience: usize) -> OptimConfig {
        OptimConfig { lr_initial: lr, lr_gamma: 0.5, lr_patience: patience, ..OptimConfig::default() }
    }

    fn adam(cfg: &OptimConfig) -> impl Optimizer<Model, TestBackend> {
        adam_config(cfg).init::<TestBackend, Model>()
    }

    fn trainer_with<O, K>(
        cfg:          OptimConfig,
        optimizer:    O,
        checkpointer: K,
        sink:         MemorySink,
    ) -> Trainer<TestBackend, Model, O, Batch>
    where
        O: Optimizer<Model, TestBackend>,
        K: Checkpointer<TestBackend, Model, O> + 'static,
    {
        let model = RegressorConfig::new(NUM_FEATURES).init::<TestBackend>(&Default::default());
        Trainer::new(&cfg, batches(2, 8), model, optimizer, MeanLoss, checkpointer, sink).unwrap()
    }

    fn recording_trainer(
        cfg:          OptimConfig,
        checkpointer: RecordingCheckpointer,
        sink:         MemorySink,
    ) -> Trainer<TestBackend, Model, impl Optimizer<Model, TestBackend>, Batch> {
        let optimizer = adam(&cfg);
        trainer_with(cfg, optimizer, checkpointer, sink)
    }

    fn validate<O>(trainer: &mut Trainer<TestBackend, Model, O, Batch>, metric: f64, iteration: u64) -> bool
    where
        O: Optimizer<Model, TestBackend>,
    {
        let metrics = ValidationMetrics::from_json(json!({ "metric": metric })).unwrap();
        trainer.after_validation(metrics, Some(iteration)).unwrap().is_best
    }

    #[test]
    fn test_step_counts_from_start_iteration() {
        let sink        = MemorySink::new();
        let mut trainer = recording_trainer(optim_config(0.01, 3), RecordingCheckpointer::default(), sink.clone())
            .with_start_iteration(5);

        for _ in 0..3 {
            let out = trainer.step(None).unwrap();
            assert!(out.scalar("loss").is_some());
        }

        assert_eq!(trainer.iteration(), 8);
        let iterations: Vec<u64> = sink.with_tag("train/loss").iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![5, 6, 7]);
        // 3 pulls over 2 batches: one full pass completed
        assert_eq!(trainer.batches().passes(), 1);
    }

    #[test]
    fn test_step_override_takes_precedence() {
        let mut trainer = recording_trainer(optim_config(0.01, 3), RecordingCheckpointer::default(), MemorySink::new());
        trainer.step(None).unwrap();
        trainer.step(Some(42)).unwrap();
        assert_eq!(trainer.iteration(), 42);
        trainer.step(Some(0)).unwrap();
        assert_eq!(trainer.iteration(), 0);
        trainer.step(None).unwrap();
        assert_eq!(trainer.iteration(), 1);
    }

    #[test]
    fn test_after_validation_contract() {
        let sink         = MemorySink::new();
        let checkpointer = RecordingCheckpointer::default();
        let mut trainer  = recording_trainer(optim_config(0.01, 3), checkpointer.clone(), sink.clone())
            .with_start_iteration(12);

        let metrics = ValidationMetrics::from_json(json!({
            "metric": 0.8,
            "modelA": { "acc": 0.9 },
        }))
        .unwrap();
        let outcome = trainer.after_validation(metrics, None).unwrap();

        assert_eq!(*checkpointer.calls.borrow(), vec![(0.8, 12)]);
        assert_eq!(trainer.scheduler().last_metric(), Some(0.8));
        assert!(outcome.is_best);
        assert!(!outcome.lr_reduced);

        let val: Vec<_> = sink
            .records()
            .into_iter()
            .filter(|r| r.tag.starts_with("val/"))
            .collect();
        assert_eq!(val.len(), 1);
        assert_eq!(val[0].tag, "val/metrics/modelA/acc");
        assert_eq!(val[0].value, 0.9);
        assert!(sink.records().iter().all(|r| !r.tag.ends_with("/metric")));
        assert_eq!(sink.with_tag("train/lr").len(), 1);
    }

    #[test]
    fn test_after_validation_iteration_override() {
        let checkpointer = RecordingCheckpointer::default();
        let mut trainer  = recording_trainer(optim_config(0.01, 3), checkpointer.clone(), MemorySink::new());

        let metrics = ValidationMetrics::from_json(json!({ "metric": 1.0 })).unwrap();
        trainer.after_validation(metrics, Some(100)).unwrap();

        assert_eq!(trainer.iteration(), 100);
        assert_eq!(checkpointer.calls.borrow()[0].1, 100);
    }

    #[test]
    fn test_best_checkpoint_follows_metric_direction() {
        let cfg = optim_config(0.01, 3);

        let up_dir = tempfile::tempdir().unwrap();
        let mut up = trainer_with(
            cfg.clone(),
            adam(&cfg),
            CheckpointManager::new(up_dir.path(), "phase").unwrap(),
            MemorySink::new(),
        );
        assert!(validate(&mut up, 0.2, 1));
        assert!(validate(&mut up, 0.4, 2));
        let best = CheckpointManager::new(up_dir.path(), "phase").unwrap().best().cloned();
        assert_eq!(best.unwrap().iteration, 2);

        let down_dir = tempfile::tempdir().unwrap();
        let mut down = trainer_with(
            cfg.clone(),
            adam(&cfg),
            CheckpointManager::new(down_dir.path(), "phase").unwrap(),
            MemorySink::new(),
        );
        assert!(validate(&mut down, 0.4, 1));
        assert!(!validate(&mut down, 0.2, 2));
        let best = CheckpointManager::new(down_dir.path(), "phase").unwrap().best().cloned();
        assert_eq!(best.unwrap().iteration, 1);
    }

    #[test]
    fn test_plateau_reduces_logged_lr() {
        let sink        = MemorySink::new();
        let mut trainer = recording_trainer(optim_config(0.1, 0), RecordingCheckpointer::default(), sink.clone());

        validate(&mut trainer, 0.5, 1);
        validate(&mut trainer, 0.5, 2);

        let lrs: Vec<f64> = sink.with_tag("train/lr").iter().map(|r| r.value).collect();
        assert_eq!(lrs.len(), 2);
        assert!((lrs[0] - 0.1).abs() < 1e-12);
        assert!((lrs[1] - 0.05).abs() < 1e-12);
        assert!((trainer.learning_rate() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut trainer = recording_trainer(optim_config(0.05, 3), RecordingCheckpointer::default(), MemorySink::new());

        let first = trainer.step(None).unwrap().scalar("loss").unwrap();
        let mut last = first;
        for _ in 0..300 {
            last = trainer.step(None).unwrap().scalar("loss").unwrap();
        }
        assert!(last < first * 0.5, "loss did not drop: first={first} last={last}");
    }

    #[test]
    fn test_compute_fn_groups_are_logged() {
        let cfg       = optim_config(0.01, 3);
        let sink      = MemorySink::new();
        let batches   = batches(1, 4);
        let model     = RegressorConfig::new(NUM_FEATURES).init::<TestBackend>(&Default::default());
        let optimizer = adam(&cfg);

        let compute = ComputeFn(|models: &Model, batch: Batch| -> Result<Computed<TestBackend>> {
            let loss  = models.loss(batch)?.mean();
            let value = loss.clone().into_scalar().elem::<f64>();
            Ok(Computed {
                gradients: loss.backward(),
                outputs:   StepOutput::new()
                    .with_scalar("loss", value)
                    .with_group("parts", [("half", value / 2.0), ("double", value * 2.0)]),
            })
        });

        let mut trainer = Trainer::new(
            &cfg, batches, model, optimizer, compute, RecordingCheckpointer::default(), sink.clone(),
        )
        .unwrap();
        trainer.step(None).unwrap();

        let tags: Vec<String> = sink.records().into_iter().map(|r| r.tag).collect();
        assert_eq!(tags, ["train/loss", "train/parts/double", "train/parts/half"]);
    }
}
