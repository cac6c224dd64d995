// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain structs and traits shared by every other layer:
// what a step reports, what validation reports, and the seams
// (batch source, metric sink) the trainer is written against.
// No burn types here.

// Named scalar / grouped outputs of one training step
pub mod outputs;

// Core abstractions other layers implement
pub mod traits;

// Validation metrics: aggregate plus per-model breakdown
pub mod validation;
