// ============================================================
// Layer 5 — Plateau Learning-Rate Scheduler
// ============================================================
// Multiplies the learning rate by `gamma` once the observed
// validation metric has stopped improving for more than
// `patience` consecutive validations.
//
// Mode is fixed to "higher is better" with a relative
// threshold: a new value m counts as an improvement when
//
//   m > best + |best| · threshold
//
// The absolute value keeps the margin positive for negated
// losses, where best · (1 + threshold) would lie below best.
//
// burn's LR schedulers are step-indexed and metric-blind; the
// trainer feeds this rate into Optimizer::step instead.

use anyhow::{ensure, Result};
use burn::optim::LearningRate;

use crate::application::config::OptimConfig;

pub const DEFAULT_THRESHOLD: f64 = 1e-2;

/// Rate changes smaller than this are ignored.
const EPS: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr:        LearningRate,
    gamma:     f64,
    patience:  usize,
    threshold: f64,
    min_lr:    LearningRate,
    best:      f64,
    num_bad:   usize,
    last:      Option<f64>,
}

impl PlateauScheduler {
    pub fn new(lr: LearningRate, gamma: f64, patience: usize) -> Result<Self> {
        ensure!(lr > 0.0, "learning rate must be positive, got {lr}");
        ensure!(
            gamma > 0.0 && gamma < 1.0,
            "plateau gamma must lie in (0, 1), got {gamma}"
        );
        Ok(Self {
            lr,
            gamma,
            patience,
            threshold: DEFAULT_THRESHOLD,
            min_lr:    0.0,
            best:      f64::NEG_INFINITY,
            num_bad:   0,
            last:      None,
        })
    }

    pub fn from_config(cfg: &OptimConfig) -> Result<Self> {
        Ok(Self::new(cfg.lr_initial, cfg.lr_gamma, cfg.lr_patience)?.with_min_lr(cfg.lr_min))
    }

    pub fn with_min_lr(mut self, min_lr: LearningRate) -> Self {
        self.min_lr = min_lr;
        self
    }

    /// Observe one validation metric. Returns true when the rate was reduced.
    pub fn step(&mut self, metric: f64) -> Result<bool> {
        ensure!(metric.is_finite(), "plateau scheduler received non-finite metric {metric}");
        self.last = Some(metric);

        if self.is_better(metric) {
            self.best    = metric;
            self.num_bad = 0;
        } else {
            self.num_bad += 1;
        }

        if self.num_bad > self.patience {
            self.num_bad = 0;
            return Ok(self.reduce());
        }
        Ok(false)
    }

    fn is_better(&self, metric: f64) -> bool {
        if self.best == f64::NEG_INFINITY {
            return true;
        }
        metric > self.best + self.best.abs() * self.threshold
    }

    fn reduce(&mut self) -> bool {
        let new_lr = (self.lr * self.gamma).max(self.min_lr);
        if self.lr - new_lr > EPS {
            tracing::info!("Plateau detected: learning rate {:.3e} → {:.3e}", self.lr, new_lr);
            self.lr = new_lr;
            true
        } else {
            false
        }
    }

    pub fn lr(&self) -> LearningRate {
        self.lr
    }

    /// Best metric seen so far (negative infinity before the first step).
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Most recent metric passed to `step`.
    pub fn last_metric(&self) -> Option<f64> {
        self.last
    }

    pub fn num_bad_steps(&self) -> usize {
        self.num_bad
    }
}
