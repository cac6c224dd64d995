// ============================================================
// Layer 6 — Metric Sinks
// ============================================================
// Where the trainer's scalars end up.
//
// CsvMetricSink appends one row per scalar to
// <dir>/scalars.csv, in long format so any tag can be plotted:
//
//   iteration,tag,value
//   1,train/loss,0.734512
//   100,train/lr,0.001000
//   100,val/metrics/regressor/mse,0.004210
//
// Grouped scalars (add_scalars) are flattened into
// "<main_tag>/<name>" rows. A tag holding a comma, quote or line
// break is written as a quoted field with inner quotes doubled:
//
//   3,"val/metrics/a,b/acc",0.500000
//
// MemorySink keeps the same records in memory; clones share
// the same buffer, so a caller can keep a handle after boxing
// one into the trainer.

use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    cell::RefCell,
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::domain::traits::MetricSink;

pub const SCALARS_FILE: &str = "scalars.csv";

/// One logged scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    /// Slash-separated name, e.g. "train/loss"
    pub tag:       String,
    pub value:     f64,
    /// Iteration the value was logged at
    pub iteration: u64,
}

// ─── CsvMetricSink ────────────────────────────────────────────────────────────
pub struct CsvMetricSink {
    /// <dir>/scalars.csv, header written on creation
    csv_path: PathBuf,
}

impl CsvMetricSink {
    /// Create the directory and write the header if the file is new.
    /// An existing file is appended to, so resumed runs extend it.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join(SCALARS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "iteration,tag,value")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn append(&self, rows: &[(&str, f64)], iteration: u64) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        for (tag, value) in rows {
            writeln!(f, "{iteration},{},{value:.6}", csv_field(tag))?;
        }
        Ok(())
    }
}

impl MetricSink for CsvMetricSink {
    fn add_scalar(&mut self, tag: &str, value: f64, iteration: u64) -> Result<()> {
        self.append(&[(tag, value)], iteration)
    }

    fn add_scalars(
        &mut self,
        main_tag:  &str,
        values:    &BTreeMap<String, f64>,
        iteration: u64,
    ) -> Result<()> {
        let tags: Vec<String> = values.keys().map(|k| format!("{main_tag}/{k}")).collect();
        let rows: Vec<(&str, f64)> = tags
            .iter()
            .map(String::as_str)
            .zip(values.values().copied())
            .collect();
        self.append(&rows, iteration)
    }
}

// ─── MemorySink ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Shared between clones
    records: Rc<RefCell<Vec<ScalarRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn records(&self) -> Vec<ScalarRecord> {
        self.records.borrow().clone()
    }

    /// Records whose tag matches exactly.
    pub fn with_tag(&self, tag: &str) -> Vec<ScalarRecord> {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    fn push(&self, tag: String, value: f64, iteration: u64) {
        self.records.borrow_mut().push(ScalarRecord { tag, value, iteration });
    }
}

impl MetricSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, iteration: u64) -> Result<()> {
        self.push(tag.to_string(), value, iteration);
        Ok(())
    }

    fn add_scalars(
        &mut self,
        main_tag:  &str,
        values:    &BTreeMap<String, f64>,
        iteration: u64,
    ) -> Result<()> {
        for (name, value) in values {
            self.push(format!("{main_tag}/{name}"), *value, iteration);
        }
        Ok(())
    }
}

/// Quote a field when it would otherwise break the row.
fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}
