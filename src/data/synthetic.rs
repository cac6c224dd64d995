// ============================================================
// Layer 4 — Synthetic Regression Data
// ============================================================
// A small, fully reproducible dataset used by the `train`
// command to exercise the harness end to end:
//
//   y = 3.0·x0 − 2.0·x1 + 0.5 + noise,   x ~ U(-1, 1)
//
// Samples implement burn's Dataset through RegressionDataset,
// and RegressionBatcher (a burn Batcher) stacks them into a
// TensorBatch with two fields:
//
//   "features" → [batch, 2]
//   "targets"  → [batch, 1]
//
// regression_loader() puts both behind burn's DataLoader, the
// same way for training (autodiff backend, shuffled every pass)
// and validation (inner backend, fixed order).

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
    tensor::TensorData,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::batch::TensorBatch;

pub const FEATURES_FIELD: &str = "features";
pub const TARGETS_FIELD:  &str = "targets";

/// Number of input features per sample.
pub const NUM_FEATURES: usize = 2;

const WEIGHTS:     [f32; NUM_FEATURES] = [3.0, -2.0];
const BIAS:        f32 = 0.5;
const NOISE_SCALE: f32 = 0.05;

/// One (x, y) pair of the synthetic relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSample {
    /// Inputs x0, x1, each drawn from U(-1, 1)
    pub features: [f32; NUM_FEATURES],

    /// Noisy target y
    pub target: f32,
}

/// Generate `n` samples from the fixed linear relation above.
pub fn generate_linear(n: usize, seed: u64) -> Vec<RegressionSample> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n)
        .map(|_| {
            let features: [f32; NUM_FEATURES] =
                std::array::from_fn(|_| rng.gen_range(-1.0f32..1.0));
            let clean: f32 = features
                .iter()
                .zip(WEIGHTS.iter())
                .map(|(x, w)| x * w)
                .sum::<f32>()
                + BIAS;
            let noise = rng.gen_range(-NOISE_SCALE..NOISE_SCALE);
            RegressionSample { features, target: clean + noise }
        })
        .collect()
}

// ─── RegressionDataset ────────────────────────────────────────────────────────
pub struct RegressionDataset {
    samples: Vec<RegressionSample>,
}

impl RegressionDataset {
    pub fn new(samples: Vec<RegressionSample>) -> Self { Self { samples } }
}

impl Dataset<RegressionSample> for RegressionDataset {
    fn get(&self, index: usize) -> Option<RegressionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── RegressionBatcher ────────────────────────────────────────────────────────
/// Stacks samples into a TensorBatch on whatever device the
/// DataLoader hands in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionBatcher;

impl<B: Backend> Batcher<B, RegressionSample, TensorBatch<B>> for RegressionBatcher {
    fn batch(&self, items: Vec<RegressionSample>, device: &B::Device) -> TensorBatch<B> {
        let batch_size = items.len();

        // [s1_x0, s1_x1, s2_x0, ...] → [batch, NUM_FEATURES]
        let features: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features)
            .collect();
        let targets: Vec<f32> = items.iter().map(|s| s.target).collect();

        let features = Tensor::<B, 2>::from_data(TensorData::new(features, [batch_size, NUM_FEATURES]), device);
        let targets  = Tensor::<B, 2>::from_data(TensorData::new(targets, [batch_size, 1]), device);

        TensorBatch::new()
            .with_field(FEATURES_FIELD, features)
            .with_field(TARGETS_FIELD, targets)
    }
}

// ─── Data Loader ──────────────────────────────────────────────────────────────
/// How to iterate a set of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderOptions {
    /// Samples per batch; the last batch of a pass may be shorter
    pub batch_size: usize,

    /// Reshuffle with this seed on every pass; `None` keeps sample order
    pub shuffle: Option<u64>,

    /// Background workers; 0 builds batches on the calling thread
    pub num_workers: usize,
}

/// Wrap `samples` in a burn DataLoader producing batches on `device`.
pub fn regression_loader<B: Backend>(
    samples: Vec<RegressionSample>,
    options: LoaderOptions,
    device:  &B::Device,
) -> Arc<dyn DataLoader<B, TensorBatch<B>>> {
    let builder = DataLoaderBuilder::new(RegressionBatcher)
        .batch_size(options.batch_size)
        .num_workers(options.num_workers)
        .set_device(device.clone());

    let builder = match options.shuffle {
        Some(seed) => builder.shuffle(seed),
        None       => builder,
    };
    builder.build(RegressionDataset::new(samples))
}
