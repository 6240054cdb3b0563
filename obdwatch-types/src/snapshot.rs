//! Snapshot - a full point-in-time read of every metric group.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{DiagnosticTroubleCode, DtcEntry, Metric, TelemetryRecord};

/// The metric groups the bridge reports, each on its own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Live,
    Engine,
    FuelAir,
    Status,
    Diagnostics,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::Live,
        Group::Engine,
        Group::FuelAir,
        Group::Status,
        Group::Diagnostics,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Group::Live => "live",
            Group::Engine => "engine",
            Group::FuelAir => "fuel_air",
            Group::Status => "status",
            Group::Diagnostics => "diagnostics",
        }
    }

    /// Metrics reported in this group, in wire order.
    pub fn metrics(self) -> impl Iterator<Item = Metric> {
        Metric::ALL.into_iter().filter(move |m| m.group() == self)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name does not match any [`Group`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown group: {0}")]
pub struct UnknownGroup(pub String);

impl FromStr for Group {
    type Err = UnknownGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGroup(s.to_string()))
    }
}

/// `live` group: fast-changing driving metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
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
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `engine` group: temperatures and ignition timing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
    #[serde(default)]
    pub coolant_temp: Option<f64>,
    #[serde(default)]
    pub intake_air_temp_c: Option<f64>,
    #[serde(default)]
    pub timing_advance_deg: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `fuel_air` group: air flow, fuel trims and consumption.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuelAirData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
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
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `status` group: slow-changing vehicle status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
    #[serde(default)]
    pub fuel_level: Option<f64>,
    #[serde(default)]
    pub control_module_voltage: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `diagnostics` group: stored trouble codes as the bridge sent them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default)]
    pub dtcs: Vec<DiagnosticTroubleCode>,
}

impl Diagnostics {
    /// Resolve every code to the common display shape.
    pub fn normalized(&self) -> Vec<DtcEntry> {
        self.dtcs.iter().cloned().map(DtcEntry::from).collect()
    }
}

/// A full point-in-time read of every group, as served by `/api/snapshot`.
///
/// Missing groups deserialize as empty so a partially populated bridge
/// still produces a usable snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub live: LiveData,
    #[serde(default)]
    pub engine: EngineData,
    #[serde(default)]
    pub fuel_air: FuelAirData,
    #[serde(default)]
    pub status: StatusData,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl Snapshot {
    /// Flatten every numeric group into a single record.
    ///
    /// The record's timestamp is the newest group timestamp, or 0 when no
    /// group carried one.
    pub fn to_record(&self) -> TelemetryRecord {
        merge_groups(&self.live, &self.engine, &self.fuel_air, &self.status)
    }
}

fn merge_groups(
    live: &LiveData,
    engine: &EngineData,
    fuel_air: &FuelAirData,
    status: &StatusData,
) -> TelemetryRecord {
    let mut record = TelemetryRecord::from(live.clone());
    record.merge_from(&engine.clone().into());
    record.merge_from(&fuel_air.clone().into());
    record.merge_from(&status.clone().into());
    record
}

/// A snapshot with its trouble codes already normalized for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotView {
    pub live: LiveData,
    pub engine: EngineData,
    pub fuel_air: FuelAirData,
    pub status: StatusData,
    pub dtcs: Vec<DtcEntry>,
}

impl SnapshotView {
    /// Numeric groups flattened into one record, see [`Snapshot::to_record`].
    pub fn to_record(&self) -> TelemetryRecord {
        merge_groups(&self.live, &self.engine, &self.fuel_air, &self.status)
    }
}

impl From<Snapshot> for SnapshotView {
    fn from(snapshot: Snapshot) -> Self {
        let dtcs = snapshot.diagnostics.normalized();
        Self {
            live: snapshot.live,
            engine: snapshot.engine,
            fuel_air: snapshot.fuel_air,
            status: snapshot.status,
            dtcs,
        }
    }
}

impl From<LiveData> for TelemetryRecord {
    fn from(data: LiveData) -> Self {
        TelemetryRecord {
            ts: data.ts.unwrap_or_default(),
            rpm: data.rpm,
            speed_kph: data.speed_kph,
            engine_load: data.engine_load,
            intake_manifold_pressure: data.intake_manifold_pressure,
            throttle_position: data.throttle_position,
            raw: data.extra,
            ..Default::default()
        }
    }
}

impl From<EngineData> for TelemetryRecord {
    fn from(data: EngineData) -> Self {
        TelemetryRecord {
            ts: data.ts.unwrap_or_default(),
            coolant_temp: data.coolant_temp,
            intake_air_temp_c: data.intake_air_temp_c,
            timing_advance_deg: data.timing_advance_deg,
            raw: data.extra,
            ..Default::default()
        }
    }
}

impl From<FuelAirData> for TelemetryRecord {
    fn from(data: FuelAirData) -> Self {
        TelemetryRecord {
            ts: data.ts.unwrap_or_default(),
            maf_gps: data.maf_gps,
            short_term_fuel_trim_b1: data.short_term_fuel_trim_b1,
            long_term_fuel_trim_b1: data.long_term_fuel_trim_b1,
            short_term_fuel_trim_b2: data.short_term_fuel_trim_b2,
            long_term_fuel_trim_b2: data.long_term_fuel_trim_b2,
            fuel_rate: data.fuel_rate,
            raw: data.extra,
            ..Default::default()
        }
    }
}

impl From<StatusData> for TelemetryRecord {
    fn from(data: StatusData) -> Self {
        TelemetryRecord {
            ts: data.ts.unwrap_or_default(),
            fuel_level: data.fuel_level,
            control_module_voltage: data.control_module_voltage,
            raw: data.extra,
            ..Default::default()
        }
    }
}
