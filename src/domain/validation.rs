// ============================================================
// Layer 3 — Validation Metrics
// ============================================================
// The result of one validation pass, as handed to
// Trainer::after_validation.
//
//   aggregate  — single score driving checkpoint selection and
//                learning-rate scheduling. Always "higher is
//                better": build it from Objective::Minimize for
//                losses/perplexities and it is negated for you.
//   per_model  — model name → metric name → value, logged as
//                "val/metrics/<model>/<metric>".
//
// JSON form (mirrors what validation loops usually produce):
//   { "metric": 0.91, "generator": { "bleu": 0.4, "perplexity": 3.1 } }

use anyhow::{bail, ensure, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key holding the aggregate score in the JSON form.
pub const AGGREGATE_KEY: &str = "metric";

/// Direction of the observed aggregate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Larger raw values are better (accuracy, BLEU).
    Maximize(f64),
    /// Smaller raw values are better (loss, perplexity); negated.
    Minimize(f64),
}

impl Objective {
    /// The value in "higher is better" orientation.
    pub fn score(self) -> f64 {
        match self {
            Objective::Maximize(v) => v,
            Objective::Minimize(v) => -v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMetrics {
    aggregate: f64,
    per_model: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ValidationMetrics {
    /// Build metrics around an aggregate objective.
    /// NaN or infinite scores are rejected.
    pub fn new(objective: Objective) -> Result<Self> {
        let aggregate = objective.score();
        ensure!(
            aggregate.is_finite(),
            "aggregate validation metric must be finite, got {aggregate}"
        );
        Ok(Self { aggregate, per_model: BTreeMap::new() })
    }

    pub fn with_metric(
        mut self,
        model:  impl Into<String>,
        name:   impl Into<String>,
        value:  f64,
    ) -> Self {
        self.insert(model, name, value);
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, name: impl Into<String>, value: f64) {
        self.per_model
            .entry(model.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Parse `{"metric": <number>, "<model>": {"<name>": <number>, ...}, ...}`.
    ///
    /// The aggregate is taken as already "higher is better".
    /// A missing or non-numeric "metric" key is an error.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            bail!("validation metrics must be a JSON object");
        };

        let aggregate = map
            .remove(AGGREGATE_KEY)
            .with_context(|| format!("validation metrics are missing the '{AGGREGATE_KEY}' key"))?;
        let aggregate = aggregate
            .as_f64()
            .with_context(|| format!("'{AGGREGATE_KEY}' must be a number, got {aggregate}"))?;

        let mut metrics = Self::new(Objective::Maximize(aggregate))?;

        for (model, entries) in map {
            let Value::Object(entries) = entries else {
                bail!("metrics for model '{model}' must be an object of numbers");
            };
            for (name, v) in entries {
                let v = v.as_f64().with_context(|| {
                    format!("metric '{model}/{name}' must be a number, got {v}")
                })?;
                metrics.insert(model.clone(), name, v);
            }
        }

        Ok(metrics)
    }

    pub fn aggregate(&self) -> f64 {
        self.aggregate
    }

    pub fn per_model(&self) -> &BTreeMap<String, BTreeMap<String, f64>> {
        &self.per_model
    }

    /// Split into (aggregate, per-model metrics), consuming self.
    pub fn into_parts(self) -> (f64, BTreeMap<String, BTreeMap<String, f64>>) {
        (self.aggregate, self.per_model)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimize_is_negated() {
        let m = ValidationMetrics::new(Objective::Minimize(3.5)).unwrap();
        assert_eq!(m.aggregate(), -3.5);
    }

    #[test]
    fn test_from_json_splits_aggregate() {
        let m = ValidationMetrics::from_json(json!({
            "metric": 0.75,
            "modelA": { "acc": 0.9 },
        }))
        .unwrap();

        let (aggregate, per_model) = m.into_parts();
        assert_eq!(aggregate, 0.75);
        assert_eq!(per_model.len(), 1);
        assert_eq!(per_model["modelA"]["acc"], 0.9);
        assert!(!per_model.contains_key(AGGREGATE_KEY));
    }

    #[test]
    fn test_missing_metric_key_is_error() {
        let err = ValidationMetrics::from_json(json!({ "modelA": { "acc": 0.9 } }))
            .unwrap_err();
        assert!(err.to_string().contains("metric"));
    }

    #[test]
    fn test_non_finite_aggregate_rejected() {
        assert!(ValidationMetrics::new(Objective::Maximize(f64::NAN)).is_err());
        assert!(ValidationMetrics::new(Objective::Minimize(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_non_numeric_model_metric_rejected() {
        let res = ValidationMetrics::from_json(json!({
            "metric": 1.0,
            "modelA": { "acc": "high" },
        }));
        assert!(res.is_err());
    }
}
