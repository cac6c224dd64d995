// ============================================================
// Layer 5 — Compute Step Strategies
// ============================================================
// The one piece of a training iteration that differs between
// experiments: run the model set forward on a batch, reduce a
// loss to a scalar and back-propagate it.
//
// The trainer owns everything around it (batch fetching, the
// optimizer update, logging, the iteration counter) and calls
// the injected ComputeStep in the middle.
//
//   MeanLoss  — model returns per-example losses; their mean is
//               back-propagated and logged as "loss"
//   ComputeFn — wraps a closure for multi-model interactions,
//               e.g. a generator and a reconstructor trained on a
//               joint objective

use anyhow::Result;
use burn::{prelude::*, tensor::backend::AutodiffBackend, tensor::ElementConversion};

use crate::domain::outputs::StepOutput;

/// Gradients of one backward pass plus the values to log.
pub struct Computed<B: AutodiffBackend> {
    pub gradients: B::Gradients,
    pub outputs:   StepOutput,
}

// ─── ComputeStep ──────────────────────────────────────────────────────────────
pub trait ComputeStep<B: AutodiffBackend, M, T> {
    fn compute(&mut self, models: &M, batch: T) -> Result<Computed<B>>;
}

// ─── LossModel ────────────────────────────────────────────────────────────────
/// A model that can score a batch with one loss value per example.
pub trait LossModel<B: Backend, T> {
    /// Shape `[batch_size]`.
    fn loss(&self, batch: T) -> Result<Tensor<B, 1>>;
}

// ─── MeanLoss ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanLoss;

impl<B, M, T> ComputeStep<B, M, T> for MeanLoss
where
    B: AutodiffBackend,
    M: LossModel<B, T>,
{
    fn compute(&mut self, models: &M, batch: T) -> Result<Computed<B>> {
        let loss  = models.loss(batch)?.mean();
        let value = loss.clone().into_scalar().elem::<f64>();

        let gradients = loss.backward();
        Ok(Computed {
            gradients,
            outputs: StepOutput::new().with_scalar("loss", value),
        })
    }
}

// ─── ComputeFn ────────────────────────────────────────────────────────────────
/// Adapts a closure into a ComputeStep.
///
/// ```ignore
/// let step = ComputeFn(|models: &JointModels<B>, batch: TensorBatch<B>| {
///     let gen_loss = models.generator.loss(batch.clone())?.mean();
///     let rec_loss = models.reconstructor.loss(batch)?.mean();
///     let total    = gen_loss.clone() + rec_loss.clone();
///     let outputs  = StepOutput::new()
///         .with_scalar("loss", total.clone().into_scalar().elem::<f64>())
///         .with_group("parts", [("generator", ...), ("reconstructor", ...)]);
///     Ok(Computed { gradients: total.backward(), outputs })
/// });
/// ```
pub struct ComputeFn<F>(pub F);

impl<B, M, T, F> ComputeStep<B, M, T> for ComputeFn<F>
where
    B: AutodiffBackend,
    F: FnMut(&M, T) -> Result<Computed<B>>,
{
    fn compute(&mut self, models: &M, batch: T) -> Result<Computed<B>> {
        (self.0)(models, batch)
    }
}
