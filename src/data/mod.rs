// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From samples to device-resident batches:
//
//   RegressionDataset  (burn Dataset)
//       │
//       ▼
//   RegressionBatcher  (burn Batcher) → TensorBatch
//       │
//       ▼
//   DataLoader         (burn DataLoaderBuilder: batch size,
//       │               per-pass shuffle, workers, device)
//       ▼
//   PerpetualBatches   → restarts the loader at every pass end
//       │
//       ▼
//   Trainer::step()

/// Named tensor batches
pub mod batch;

/// Endless cycling over a burn DataLoader
pub mod perpetual;

/// Seeded shuffle and train/validation split
pub mod splitter;

/// Synthetic linear-regression data, batcher and loaders
pub mod synthetic;
