// ============================================================
// Layer 5 — Regressor Model
// ============================================================
// A single linear layer, enough to show the harness driving a
// real burn module: y_hat = W·x + b, trained on squared error.

use anyhow::Result;
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::data::{
    batch::TensorBatch,
    synthetic::{FEATURES_FIELD, TARGETS_FIELD},
};
use crate::ml::compute::LossModel;

#[derive(Config, Debug)]
pub struct RegressorConfig {
    pub num_features: usize,
    #[config(default = 1)]
    pub num_outputs:  usize,
}

impl RegressorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Regressor<B> {
        Regressor {
            linear: LinearConfig::new(self.num_features, self.num_outputs).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Regressor<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> Regressor<B> {
    /// [batch, num_features] → [batch, num_outputs]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(features)
    }

    /// Per-example squared error, shape [batch].
    pub fn squared_error(&self, batch: &TensorBatch<B>) -> Result<Tensor<B, 1>> {
        let preds   = self.forward(batch.field(FEATURES_FIELD)?);
        let targets = batch.field(TARGETS_FIELD)?;
        let diff    = preds - targets;

        // [batch, out] → [batch, 1] → [batch]
        Ok((diff.clone() * diff).sum_dim(1).flatten::<1>(0, 1))
    }
}

impl<B: Backend> LossModel<B, TensorBatch<B>> for Regressor<B> {
    fn loss(&self, batch: TensorBatch<B>) -> Result<Tensor<B, 1>> {
        self.squared_error(&batch)
    }
}
