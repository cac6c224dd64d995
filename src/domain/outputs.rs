// ============================================================
// Layer 3 — Iteration Outputs
// ============================================================
// What a compute step hands back to the trainer for logging.
// Keys are logged under "train/<key>": plain scalars one by
// one, groups as a set of scalars sharing the same main tag.

use std::collections::BTreeMap;

/// One logged value produced by a training iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    /// A single float (e.g. the batch loss)
    Scalar(f64),

    /// Several related floats logged together (e.g. per-term losses)
    Group(BTreeMap<String, f64>),
}

/// Ordered map of output key → value for one iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    values: BTreeMap<String, OutputValue>,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), OutputValue::Scalar(value));
        self
    }

    pub fn with_group<K, I>(mut self, key: impl Into<String>, group: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let group = group.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.values.insert(key.into(), OutputValue::Group(group));
        self
    }

    pub fn get(&self, key: &str) -> Option<&OutputValue> {
        self.values.get(key)
    }

    /// Convenience lookup for scalar entries; `None` for groups.
    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(OutputValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
