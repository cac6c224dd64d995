// ============================================================
// Layer 4 — Tensor Batch
// ============================================================
// A batch is a mapping from field name to tensor, e.g.
//
//   "features" → [batch_size, n_features]
//   "targets"  → [batch_size, 1]
//
// Every field is a rank-2 float tensor; per-example scalars use
// a trailing dimension of 1. Batches are built by a burn Batcher
// directly on the data loader's device.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::collections::BTreeMap;

// ─── TensorBatch ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TensorBatch<B: Backend> {
    /// Field name → tensor of shape [batch_size, width]
    fields: BTreeMap<String, Tensor<B, 2>>,
}

impl<B: Backend> TensorBatch<B> {
    pub fn new() -> Self {
        Self { fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, tensor: Tensor<B, 2>) -> Self {
        self.fields.insert(name.into(), tensor);
        self
    }

    /// Clone out a field. A missing field means a malformed batch.
    pub fn field(&self, name: &str) -> Result<Tensor<B, 2>> {
        self.fields
            .get(name)
            .cloned()
            .with_context(|| format!("batch has no field '{name}'"))
    }

    /// Number of examples, read from the first dimension of any field.
    pub fn batch_size(&self) -> usize {
        self.fields
            .values()
            .next()
            .map(|t| t.dims()[0])
            .unwrap_or(0)
    }
}

impl<B: Backend> Default for TensorBatch<B> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn tensor(values: Vec<f32>, rows: usize, cols: usize) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, [rows, cols]), &Default::default())
    }

    #[test]
    fn test_field_lookup() {
        let batch = TensorBatch::<TestBackend>::new()
            .with_field("features", tensor(vec![1.0, 2.0, 3.0, 4.0], 2, 2))
            .with_field("targets", tensor(vec![0.5, 1.5], 2, 1));

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.field("targets").unwrap().dims(), [2, 1]);
        assert_eq!(batch.field("features").unwrap().dims(), [2, 2]);
    }

    #[test]
    fn test_missing_field_is_error() {
        let batch = TensorBatch::<TestBackend>::new();
        let err = batch.field("features").unwrap_err();
        assert!(err.to_string().contains("features"));
        assert_eq!(batch.batch_size(), 0);
    }
}
