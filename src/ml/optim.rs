// ============================================================
// Layer 5 — Optimizer Construction
// ============================================================
// Default optimizer of the harness: Adam over every parameter
// of the model set, with L2 weight decay from the config.
// The learning rate is not stored in the optimizer; burn takes
// it per step, and the trainer passes the scheduler's rate.
//
//   m = β1·m + (1−β1)·g
//   v = β2·v + (1−β2)·g²
//   θ = θ − lr · m / (√v + ε)

use burn::optim::{decay::WeightDecayConfig, AdamConfig};

use crate::application::config::OptimConfig;

pub fn adam_config(cfg: &OptimConfig) -> AdamConfig {
    let weight_decay = (cfg.weight_decay > 0.0).then(|| WeightDecayConfig::new(cfg.weight_decay as f32));
    AdamConfig::new()
        .with_epsilon(1e-8)
        .with_weight_decay(weight_decay)
}
