//! Metric names - the single mapping from a numeric field to its wire name.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Group;

/// A numeric telemetry field.
///
/// Serializes as the field name the bridge uses on the wire, so the same
/// value works as a JSON key, a config entry, and a `series()` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "rpm")]
    Rpm,
    #[serde(rename = "speed_kph")]
    SpeedKph,
    #[serde(rename = "engine_load")]
    EngineLoad,
    #[serde(rename = "intake_manifold_pressure")]
    IntakeManifoldPressure,
    #[serde(rename = "throttle_position")]
    ThrottlePosition,
    #[serde(rename = "coolant_temp")]
    CoolantTemp,
    #[serde(rename = "intake_air_temp_c")]
    IntakeAirTemp,
    #[serde(rename = "timing_advance_deg")]
    TimingAdvance,
    #[serde(rename = "maf_gps")]
    MassAirFlow,
    #[serde(rename = "short_term_fuel_trim_B1")]
    ShortTermFuelTrimBank1,
    #[serde(rename = "long_term_fuel_trim_B1")]
    LongTermFuelTrimBank1,
    #[serde(rename = "short_term_fuel_trim_B2")]
    ShortTermFuelTrimBank2,
    #[serde(rename = "long_term_fuel_trim_B2")]
    LongTermFuelTrimBank2,
    #[serde(rename = "fuel_rate")]
    FuelRate,
    #[serde(rename = "fuel_level")]
    FuelLevel,
    #[serde(rename = "control_module_voltage")]
    ControlModuleVoltage,
}

impl Metric {
    /// Every metric, in wire-group order.
    pub const ALL: [Metric; 16] = [
        Metric::Rpm,
        Metric::SpeedKph,
        Metric::EngineLoad,
        Metric::IntakeManifoldPressure,
        Metric::ThrottlePosition,
        Metric::CoolantTemp,
        Metric::IntakeAirTemp,
        Metric::TimingAdvance,
        Metric::MassAirFlow,
        Metric::ShortTermFuelTrimBank1,
        Metric::LongTermFuelTrimBank1,
        Metric::ShortTermFuelTrimBank2,
        Metric::LongTermFuelTrimBank2,
        Metric::FuelRate,
        Metric::FuelLevel,
        Metric::ControlModuleVoltage,
    ];

    /// The JSON field name used by the bridge.
    pub const fn field_name(self) -> &'static str {
        match self {
            Metric::Rpm => "rpm",
            Metric::SpeedKph => "speed_kph",
            Metric::EngineLoad => "engine_load",
            Metric::IntakeManifoldPressure => "intake_manifold_pressure",
            Metric::ThrottlePosition => "throttle_position",
            Metric::CoolantTemp => "coolant_temp",
            Metric::IntakeAirTemp => "intake_air_temp_c",
            Metric::TimingAdvance => "timing_advance_deg",
            Metric::MassAirFlow => "maf_gps",
            Metric::ShortTermFuelTrimBank1 => "short_term_fuel_trim_B1",
            Metric::LongTermFuelTrimBank1 => "long_term_fuel_trim_B1",
            Metric::ShortTermFuelTrimBank2 => "short_term_fuel_trim_B2",
            Metric::LongTermFuelTrimBank2 => "long_term_fuel_trim_B2",
            Metric::FuelRate => "fuel_rate",
            Metric::FuelLevel => "fuel_level",
            Metric::ControlModuleVoltage => "control_module_voltage",
        }
    }

    /// The snapshot group this metric is reported in.
    pub const fn group(self) -> Group {
        match self {
            Metric::Rpm
            | Metric::SpeedKph
            | Metric::EngineLoad
            | Metric::IntakeManifoldPressure
            | Metric::ThrottlePosition => Group::Live,
            Metric::CoolantTemp | Metric::IntakeAirTemp | Metric::TimingAdvance => Group::Engine,
            Metric::MassAirFlow
            | Metric::ShortTermFuelTrimBank1
            | Metric::LongTermFuelTrimBank1
            | Metric::ShortTermFuelTrimBank2
            | Metric::LongTermFuelTrimBank2
            | Metric::FuelRate => Group::FuelAir,
            Metric::FuelLevel | Metric::ControlModuleVoltage => Group::Status,
        }
    }

    /// Display unit.
    pub const fn unit(self) -> &'static str {
        match self {
            Metric::Rpm => "rpm",
            Metric::SpeedKph => "km/h",
            Metric::EngineLoad
            | Metric::ThrottlePosition
            | Metric::ShortTermFuelTrimBank1
            | Metric::LongTermFuelTrimBank1
            | Metric::ShortTermFuelTrimBank2
            | Metric::LongTermFuelTrimBank2
            | Metric::FuelLevel => "%",
            Metric::IntakeManifoldPressure => "kPa",
            Metric::CoolantTemp | Metric::IntakeAirTemp => "°C",
            Metric::TimingAdvance => "°",
            Metric::MassAirFlow => "g/s",
            Metric::FuelRate => "L/h",
            Metric::ControlModuleVoltage => "V",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Returned when a field name does not match any [`Metric`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.field_name() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip_through_from_str() {
        for metric in Metric::ALL {
            assert_eq!(metric.field_name().parse::<Metric>(), Ok(metric));
        }
    }

    #[test]
    fn serde_name_matches_field_name() {
        for metric in Metric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.field_name()));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "boost_psi".parse::<Metric>().unwrap_err();
        assert_eq!(err.to_string(), "unknown metric: boost_psi");
    }

    #[test]
    fn fuel_trims_keep_bank_suffix_case() {
        assert_eq!(Metric::ShortTermFuelTrimBank1.field_name(), "short_term_fuel_trim_B1");
        assert_eq!(Metric::LongTermFuelTrimBank2.group(), Group::FuelAir);
    }
}
