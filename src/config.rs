//! Layered settings: built-in defaults, an optional TOML file, then
//! `OBDWATCH_*` environment variables (`__` separates nesting, e.g.
//! `OBDWATCH_SNAPSHOT__INTERVAL_MS=500`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use obdwatch_types::Metric;

use crate::data::{Thresholds, TrendBounds};

/// File looked up in the working directory when no `--config` is given.
const DEFAULT_CONFIG_NAME: &str = "obdwatch";
const ENV_PREFIX: &str = "OBDWATCH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stream: StreamSettings,
    pub snapshot: SnapshotSettings,
    pub history: HistorySettings,
    pub trend: TrendSettings,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// `host:port` of the bridge's line-delimited JSON stream.
    pub address: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8765".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Base URL of the bridge HTTP API.
    pub url: Option<String>,
    /// JSON file to read snapshots from instead of the API.
    pub file: Option<PathBuf>,
    pub interval_ms: u64,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            interval_ms: 2_000,
        }
    }
}

impl SnapshotSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub detail_capacity: usize,
    pub feed_capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            detail_capacity: crate::data::history::DEFAULT_DETAIL_CAPACITY,
            feed_capacity: crate::data::history::DEFAULT_FEED_CAPACITY,
        }
    }
}

/// Drawing surface and series selection for trends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    pub width: f64,
    pub height: f64,
    /// Metrics to compute trends for.
    pub metrics: Vec<Metric>,
    /// Fixed value ranges; metrics not listed are scaled to their data.
    pub ranges: Vec<TrendRange>,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 80.0,
            metrics: Metric::ALL.to_vec(),
            ranges: Vec::new(),
        }
    }
}

impl TrendSettings {
    pub fn bounds_for(&self, metric: Metric) -> TrendBounds {
        self.ranges
            .iter()
            .find(|range| range.metric == metric)
            .map(|range| TrendBounds {
                min: range.min,
                max: range.max,
            })
            .unwrap_or_default()
    }
}

/// A fixed plotting range for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRange {
    pub metric: Metric,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Settings {
    /// Load settings from `path` (required when given) or from an optional
    /// `obdwatch.toml` in the working directory, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.detail_capacity == 0 || self.history.feed_capacity == 0 {
            bail!("history capacities must be at least 1");
        }
        if !(self.trend.width > 0.0 && self.trend.height > 0.0) {
            bail!(
                "trend surface must have a positive size, got {}x{}",
                self.trend.width,
                self.trend.height
            );
        }
        if self.snapshot.url.is_some() && self.snapshot.file.is_some() {
            bail!("snapshot.url and snapshot.file are mutually exclusive");
        }
        Ok(())
    }
}
