// ============================================================
// Layer 2 — Harness Configuration
// ============================================================
// All knobs of a training run, serialisable to JSON so the
// resolved config can be recorded next to the checkpoints.
//
// Overrides use dotted keys against the JSON form:
//
//   {"optim.lr_initial": 0.01, "schedule.batch_size": 64}
//
// Keys that do not exist in the config are ignored and reported
// back as ConfigDiagnostic values; nothing is printed from here.

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, fs, path::Path};

pub const CONFIG_FILE: &str = "config.json";

// ─── Optimizer / Scheduler ────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    /// Rate the plateau scheduler starts from
    pub lr_initial:   f64,

    /// Adam L2 penalty; 0 disables it
    pub weight_decay: f64,

    /// Multiplier applied on a plateau, in (0, 1)
    pub lr_gamma:     f64,

    /// Validations without improvement tolerated before a reduction
    pub lr_patience:  usize,

    /// Floor the rate never drops below
    pub lr_min:       f64,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            lr_initial:   1e-3,
            weight_decay: 0.0,
            lr_gamma:     0.5,
            lr_patience:  3,
            lr_min:       0.0,
        }
    }
}

// ─── Iteration Schedule ───────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Iteration the run stops at; a resumed run counts up to the same value
    pub num_iterations:   u64,

    /// Iterations between validations (and checkpoint decisions)
    pub checkpoint_every: u64,

    /// Items per training and validation batch
    pub batch_size:       usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            num_iterations:   2000,
            checkpoint_every: 100,
            batch_size:       32,
        }
    }
}

// ─── HarnessConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Training phase name, used as the checkpoint file prefix
    pub phase:       String,

    /// Seeds data generation, the split and per-pass shuffling
    pub random_seed: u64,

    pub optim:       OptimConfig,
    pub schedule:    ScheduleConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            phase:       "joint_training".to_string(),
            random_seed: 0,
            optim:       OptimConfig::default(),
            schedule:    ScheduleConfig::default(),
        }
    }
}

/// Something worth telling the user about a config override.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigDiagnostic {
    /// The key does not exist in the config and was ignored.
    UnknownKey(String),
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigDiagnostic::UnknownKey(key) => {
                write!(f, "config key '{key}' does not exist in the provided config; ignored")
            }
        }
    }
}

impl HarnessConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config in '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Record the resolved config as `<dir>/config.json`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved config to '{}'", path.display());
        Ok(())
    }

    /// Apply overrides given as a JSON object string with dotted keys.
    pub fn apply_override_str(&mut self, overrides: &str) -> Result<Vec<ConfigDiagnostic>> {
        let value: Value = serde_json::from_str(overrides)
            .with_context(|| format!("Config override is not valid JSON: {overrides}"))?;
        let Value::Object(map) = value else {
            bail!("Config override must be a JSON object, got {overrides}");
        };
        self.apply_overrides(&map)
    }

    /// Apply dotted-key overrides. Existing keys are replaced, unknown
    /// keys are skipped and reported. The result is re-validated.
    pub fn apply_overrides(&mut self, overrides: &Map<String, Value>) -> Result<Vec<ConfigDiagnostic>> {
        let mut tree        = serde_json::to_value(&*self)?;
        let mut diagnostics = Vec::new();

        for (key, value) in overrides {
            match lookup_mut(&mut tree, key) {
                Some(slot) if !slot.is_object() => *slot = value.clone(),
                Some(_) => bail!("Config key '{key}' is a section; override its fields instead"),
                None => diagnostics.push(ConfigDiagnostic::UnknownKey(key.clone())),
            }
        }

        let updated: Self = serde_json::from_value(tree)
            .context("Config override produced a value of the wrong type")?;
        updated.validate()?;
        *self = updated;

        Ok(diagnostics)
    }

    pub fn validate(&self) -> Result<()> {
        let o = &self.optim;
        ensure!(o.lr_initial > 0.0, "optim.lr_initial must be positive, got {}", o.lr_initial);
        ensure!(o.weight_decay >= 0.0, "optim.weight_decay must be non-negative, got {}", o.weight_decay);
        ensure!(
            o.lr_gamma > 0.0 && o.lr_gamma < 1.0,
            "optim.lr_gamma must lie in (0, 1), got {}",
            o.lr_gamma
        );
        ensure!(
            o.lr_min >= 0.0 && o.lr_min < o.lr_initial,
            "optim.lr_min must lie in [0, lr_initial), got {}",
            o.lr_min
        );

        let s = &self.schedule;
        ensure!(s.batch_size > 0, "schedule.batch_size must be positive");
        ensure!(s.checkpoint_every > 0, "schedule.checkpoint_every must be positive");
        ensure!(!self.phase.is_empty(), "phase must not be empty");
        Ok(())
    }
}

/// Walk `a.b.c` through nested JSON objects.
fn lookup_mut<'a>(tree: &'a mut Value, dotted: &str) -> Option<&'a mut Value> {
    dotted
        .split('.')
        .try_fold(tree, |node, part| node.as_object_mut()?.get_mut(part))
}
