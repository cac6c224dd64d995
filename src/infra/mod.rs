// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
//   checkpoint.rs — best-metric model/optimizer snapshots
//                   (burn CompactRecorder) plus a JSON pointer
//                   to the current best
//
//   metrics.rs    — scalar sinks: CSV file and in-memory

/// Best-checkpoint saving and loading
pub mod checkpoint;

/// Scalar metric sinks
pub mod metrics;
