// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
//   compute.rs   — the per-batch loss/backward hook
//   model.rs     — linear regressor used by the demo pipeline
//   optim.rs     — Adam construction from the config
//   scheduler.rs — reduce-on-plateau learning rate
//   trainer.rs   — the generic iteration-indexed trainer
//   validator.rs — validation hook producing ValidationMetrics

/// Compute step: forward, loss, backward
pub mod compute;

/// Linear regression model
pub mod model;

/// Optimizer construction
pub mod optim;

/// Plateau learning-rate scheduler
pub mod scheduler;

/// Generic trainer
pub mod trainer;

/// Validators
pub mod validator;
