// ============================================================
// Layer 5 — Validators
// ============================================================
// A validator scores the model set on held-out data and
// produces the ValidationMetrics the trainer reacts to.
//
// It receives `models.valid()`: the same parameters on the
// inner (non-autodiff) backend, so no gradient graph is built
// and dropout-style layers run in inference mode.

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::sync::Arc;

use crate::data::batch::TensorBatch;
use crate::data::synthetic::{TARGETS_FIELD, FEATURES_FIELD};
use crate::domain::validation::{Objective, ValidationMetrics};
use crate::ml::model::Regressor;

// ─── Validator ────────────────────────────────────────────────────────────────
pub trait Validator<B: AutodiffBackend, M: AutodiffModule<B>> {
    fn validate(&mut self, models: &M::InnerModule) -> Result<ValidationMetrics>;
}

/// Validation batches live on the inner backend, next to `valid()` models.
pub type InnerLoader<B> =
    Arc<dyn DataLoader<<B as AutodiffBackend>::InnerBackend, TensorBatch<<B as AutodiffBackend>::InnerBackend>>>;

// ─── RegressionValidator ──────────────────────────────────────────────────────
/// Reports mse/mae for the "regressor" model. The aggregate is
/// `Objective::Minimize(mse)`, i.e. the negated mse.
pub struct RegressionValidator<B: AutodiffBackend> {
    /// One full pass per validation, in a fixed order
    loader: InnerLoader<B>,
}

impl<B: AutodiffBackend> RegressionValidator<B> {
    pub const MODEL_NAME: &'static str = "regressor";

    pub fn new(loader: InnerLoader<B>) -> Result<Self> {
        ensure!(loader.num_items() > 0, "validation set is empty");
        Ok(Self { loader })
    }
}

impl<B: AutodiffBackend> Validator<B, Regressor<B>> for RegressionValidator<B> {
    fn validate(&mut self, model: &Regressor<B::InnerBackend>) -> Result<ValidationMetrics> {
        let mut squared_sum  = 0.0f64;
        let mut absolute_sum = 0.0f64;
        let mut count        = 0usize;

        for batch in self.loader.iter() {
            let preds = model.forward(batch.field(FEATURES_FIELD)?);
            let diff  = preds - batch.field(TARGETS_FIELD)?;

            squared_sum  += (diff.clone() * diff.clone()).sum().into_scalar().elem::<f64>();
            absolute_sum += diff.abs().sum().into_scalar().elem::<f64>();
            count        += batch.batch_size();
        }
        ensure!(count > 0, "validation loader yielded no examples");

        let n   = count as f64;
        let mse = squared_sum / n;
        let mae = absolute_sum / n;
        tracing::debug!("Validation over {} samples: mse={:.6} mae={:.6}", count, mse, mae);

        Ok(ValidationMetrics::new(Objective::Minimize(mse))?
            .with_metric(Self::MODEL_NAME, "mse", mse)
            .with_metric(Self::MODEL_NAME, "mae", mae))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate_linear, regression_loader, LoaderOptions, NUM_FEATURES};
    use crate::ml::model::RegressorConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;
    type Inner       = NdArray;

    fn options(batch_size: usize) -> LoaderOptions {
        LoaderOptions { batch_size, shuffle: None, num_workers: 0 }
    }

    #[test]
    fn test_reports_negated_mse() {
        let device = Default::default();
        let model  = RegressorConfig::new(NUM_FEATURES).init::<TestBackend>(&device);
        let loader = regression_loader::<Inner>(generate_linear(10, 2), options(4), &device);
        let mut validator = RegressionValidator::<TestBackend>::new(loader).unwrap();

        let metrics = validator.validate(&model.valid()).unwrap();
        let mse     = metrics.per_model()["regressor"]["mse"];
        assert!(mse >= 0.0);
        assert_eq!(metrics.aggregate(), -mse);
        assert!(metrics.per_model()["regressor"].contains_key("mae"));
    }

    #[test]
    fn test_batch_size_does_not_change_the_mean() {
        let device  = Default::default();
        let model   = RegressorConfig::new(NUM_FEATURES).init::<TestBackend>(&device);
        let samples = generate_linear(10, 2);

        let mse_of = |batch_size| {
            let loader = regression_loader::<Inner>(samples.clone(), options(batch_size), &device);
            let mut validator = RegressionValidator::<TestBackend>::new(loader).unwrap();
            validator.validate(&model.valid()).unwrap().per_model()["regressor"]["mse"]
        };

        // 10 over 4 leaves a short tail; every example still counts once
        assert!((mse_of(4) - mse_of(10)).abs() < 1e-5);
    }

    #[test]
    fn test_empty_validation_set_rejected() {
        let loader = regression_loader::<Inner>(Vec::new(), options(4), &Default::default());
        assert!(RegressionValidator::<TestBackend>::new(loader).is_err());
    }
}
