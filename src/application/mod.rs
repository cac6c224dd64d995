// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers into a training run. No tensor
// math lives here and nothing is printed; the CLI reports.

// Harness configuration, JSON on disk, dotted-key overrides
pub mod config;

// The training workflow and its step/validate schedule
pub mod train_use_case;
