//! Telemetry record - one timestamped set of metric values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Metric;

/// One timestamped set of vehicle metrics.
///
/// Every metric is optional: `None` means the bridge did not report it.
/// A reported value may still be NaN, which consumers treat as "no reading"
/// rather than as a bad value. Keys the schema does not model (for example
/// the bridge's raw PID responses) are kept in [`raw`](Self::raw).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub ts: u64,

    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub speed_kph: Option<f64>,
    #[serde(default)]
    pub engine_load: Option<f64>,
    #[serde(default)]
    pub intake_manifold_pressure: Option<f64>,
    #[serde(default)]
    pub throttle_position: Option<f64>,

    #[serde(default)]
    pub coolant_temp: Option<f64>,
    #[serde(default)]
    pub intake_air_temp_c: Option<f64>,
    #[serde(default)]
    pub timing_advance_deg: Option<f64>,

    #[serde(default)]
    pub maf_gps: Option<f64>,
    #[serde(default, rename = "short_term_fuel_trim_B1")]
    pub short_term_fuel_trim_b1: Option<f64>,
    #[serde(default, rename = "long_term_fuel_trim_B1")]
    pub long_term_fuel_trim_b1: Option<f64>,
    #[serde(default, rename = "short_term_fuel_trim_B2")]
    pub short_term_fuel_trim_b2: Option<f64>,
    #[serde(default, rename = "long_term_fuel_trim_B2")]
    pub long_term_fuel_trim_b2: Option<f64>,
    #[serde(default)]
    pub fuel_rate: Option<f64>,

    #[serde(default)]
    pub fuel_level: Option<f64>,
    #[serde(default)]
    pub control_module_voltage: Option<f64>,

    /// Fields not individually modeled, passed through untouched.
    #[serde(flatten)]
    pub raw: BTreeMap<String, Value>,
}

impl TelemetryRecord {
    /// Create an empty record at the given timestamp.
    pub fn new(ts: u64) -> Self {
        Self {
            ts,
            ..Default::default()
        }
    }

    /// Set a metric and return the record, for building records inline.
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, Some(value));
        self
    }

    /// Read one metric.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Rpm => self.rpm,
            Metric::SpeedKph => self.speed_kph,
            Metric::EngineLoad => self.engine_load,
            Metric::IntakeManifoldPressure => self.intake_manifold_pressure,
            Metric::ThrottlePosition => self.throttle_position,
            Metric::CoolantTemp => self.coolant_temp,
            Metric::IntakeAirTemp => self.intake_air_temp_c,
            Metric::TimingAdvance => self.timing_advance_deg,
            Metric::MassAirFlow => self.maf_gps,
            Metric::ShortTermFuelTrimBank1 => self.short_term_fuel_trim_b1,
            Metric::LongTermFuelTrimBank1 => self.long_term_fuel_trim_b1,
            Metric::ShortTermFuelTrimBank2 => self.short_term_fuel_trim_b2,
            Metric::LongTermFuelTrimBank2 => self.long_term_fuel_trim_b2,
            Metric::FuelRate => self.fuel_rate,
            Metric::FuelLevel => self.fuel_level,
            Metric::ControlModuleVoltage => self.control_module_voltage,
        }
    }

    /// Overwrite one metric.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Rpm => &mut self.rpm,
            Metric::SpeedKph => &mut self.speed_kph,
            Metric::EngineLoad => &mut self.engine_load,
            Metric::IntakeManifoldPressure => &mut self.intake_manifold_pressure,
            Metric::ThrottlePosition => &mut self.throttle_position,
            Metric::CoolantTemp => &mut self.coolant_temp,
            Metric::IntakeAirTemp => &mut self.intake_air_temp_c,
            Metric::TimingAdvance => &mut self.timing_advance_deg,
            Metric::MassAirFlow => &mut self.maf_gps,
            Metric::ShortTermFuelTrimBank1 => &mut self.short_term_fuel_trim_b1,
            Metric::LongTermFuelTrimBank1 => &mut self.long_term_fuel_trim_b1,
            Metric::ShortTermFuelTrimBank2 => &mut self.short_term_fuel_trim_b2,
            Metric::LongTermFuelTrimBank2 => &mut self.long_term_fuel_trim_b2,
            Metric::FuelRate => &mut self.fuel_rate,
            Metric::FuelLevel => &mut self.fuel_level,
            Metric::ControlModuleVoltage => &mut self.control_module_voltage,
        };
        *slot = value;
    }

    /// Iterate over the metrics that are present (NaN included).
    pub fn values(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(move |m| self.get(m).map(|v| (m, v)))
    }

    /// True when no metric is present.
    pub fn is_empty(&self) -> bool {
        self.values().next().is_none()
    }

    /// Copy every present metric from `other` over this record's values.
    pub fn merge_from(&mut self, other: &TelemetryRecord) {
        for (metric, value) in other.values() {
            self.set(metric, Some(value));
        }
        self.ts = self.ts.max(other.ts);
        for (key, value) in &other.raw {
            self.raw.insert(key.clone(), value.clone());
        }
    }
}
