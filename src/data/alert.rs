//! Threshold-based alert classification.
//!
//! The policy is plain data: a table of per-metric rules, each a list of
//! bounds. Classification picks the most severe bound a value crosses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use obdwatch_types::{Metric, TelemetryRecord};

/// Alert level for a single metric reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Normal,
    Warn,
    Bad,
}

impl AlertStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            AlertStatus::Normal => "OK",
            AlertStatus::Warn => "WARN",
            AlertStatus::Bad => "BAD",
        }
    }
}

/// How a reading is compared against a bound's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, reading: f64, value: f64) -> bool {
        match self {
            Comparison::Lt => reading < value,
            Comparison::Le => reading <= value,
            Comparison::Gt => reading > value,
            Comparison::Ge => reading >= value,
        }
    }
}

/// One threshold: when `reading <when> value`, the metric is at `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub when: Comparison,
    pub value: f64,
    pub status: AlertStatus,
}

impl Bound {
    pub fn new(when: Comparison, value: f64, status: AlertStatus) -> Self {
        Self { when, value, status }
    }
}

/// The bounds that apply to one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRule {
    pub metric: Metric,
    #[serde(default)]
    pub bounds: Vec<Bound>,
}

impl MetricRule {
    pub fn new(metric: Metric, bounds: Vec<Bound>) -> Self {
        Self { metric, bounds }
    }
}

/// Classify one reading against one rule.
///
/// Missing and NaN readings are `Normal`: no reading is not a bad reading.
pub fn classify(value: Option<f64>, rule: &MetricRule) -> AlertStatus {
    let Some(reading) = value.filter(|v| !v.is_nan()) else {
        return AlertStatus::Normal;
    };

    rule.bounds
        .iter()
        .filter(|bound| bound.when.holds(reading, bound.value))
        .map(|bound| bound.status)
        .max()
        .unwrap_or_default()
}

/// The alert policy: a list of per-metric rules.
///
/// Supplying a table replaces the default one entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub rules: Vec<MetricRule>,
}

impl Default for Thresholds {
    fn default() -> Self {
        use AlertStatus::{Bad, Warn};
        use Comparison::{Ge, Gt, Le, Lt};

        Self {
            rules: vec![
                MetricRule::new(
                    Metric::CoolantTemp,
                    vec![Bound::new(Ge, 110.0, Bad), Bound::new(Ge, 103.0, Warn)],
                ),
                MetricRule::new(
                    Metric::ControlModuleVoltage,
                    vec![
                        Bound::new(Lt, 12.0, Bad),
                        Bound::new(Lt, 12.6, Warn),
                        Bound::new(Gt, 15.2, Warn),
                    ],
                ),
                MetricRule::new(Metric::FuelLevel, vec![Bound::new(Le, 15.0, Warn)]),
            ],
        }
    }
}

impl Thresholds {
    /// An empty table: every metric classifies as normal.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Metrics that have at least one rule, without duplicates.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = self.rules.iter().map(|rule| rule.metric).collect();
        metrics.sort();
        metrics.dedup();
        metrics
    }

    /// Classify a reading of `metric`. Metrics without a rule are normal.
    pub fn classify(&self, metric: Metric, value: Option<f64>) -> AlertStatus {
        self.rules
            .iter()
            .filter(|rule| rule.metric == metric)
            .map(|rule| classify(value, rule))
            .max()
            .unwrap_or_default()
    }

    /// Classify every metric the table has a rule for.
    pub fn classify_record(&self, record: &TelemetryRecord) -> BTreeMap<Metric, AlertStatus> {
        self.metrics()
            .into_iter()
            .map(|metric| (metric, self.classify(metric, record.get(metric))))
            .collect()
    }
}
