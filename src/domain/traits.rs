// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Framework-free seams of the harness:
//
//   MetricSink — where scalars logged by the trainer end up
//                (CSV file, memory, ...).
//
// Traits that mention tensors, modules, loaders or optimizers
// live in the ml and infra layers next to their implementations.

use anyhow::Result;
use std::collections::BTreeMap;

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Receives scalars tagged with a string key and an iteration number.
///
/// Implementations:
///   - CsvMetricSink → appends rows to <dir>/scalars.csv
///   - MemorySink    → keeps records in memory
pub trait MetricSink {
    fn add_scalar(&mut self, tag: &str, value: f64, iteration: u64) -> Result<()>;

    /// Log a group of scalars under one main tag.
    fn add_scalars(
        &mut self,
        main_tag:  &str,
        values:    &BTreeMap<String, f64>,
        iteration: u64,
    ) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
