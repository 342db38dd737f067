//! Canonical telemetry metric names.
//!
//! The bridge flattens the T-BOX payload into `section_field` keys. Only the
//! names enumerated here are tracked; anything else is dropped at the
//! snapshot boundary (see [`crate::snapshot`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Engine coolant temperature in degrees Celsius.
pub const METRIC_ENGINE_COOLANT_TEMP: &str = "engine_coolant_temp";

/// Engine oil pressure in bar.
pub const METRIC_ENGINE_OIL_PRESSURE: &str = "engine_oil_pressure";

/// Battery state of health in percent.
pub const METRIC_BATTERY_SOH: &str = "battery_soh";

/// Hottest battery cell temperature in degrees Celsius.
pub const METRIC_BATTERY_TEMP_MAX: &str = "battery_temp_max";

/// Hydraulic system pressure in bar.
pub const METRIC_HYDRAULIC_PRESSURE: &str = "hydraulic_pressure";

/// Aggregate sensor quality score (0-100).
pub const METRIC_SENSOR_QUALITY_SCORE: &str = "sensor_quality_score";

/// Name the bridge uses for hydraulic pressure when it flattens the
/// `hydraulic.system_pressure` field.
const ALIAS_HYDRAULIC_SYSTEM_PRESSURE: &str = "hydraulic_system_pressure";

/// A tracked telemetry metric.
///
/// The variant order is the canonical order used when iterating windows and
/// when listing flagged metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    EngineCoolantTemp,
    EngineOilPressure,
    EngineOilTemp,
    EngineRpm,
    BatterySoh,
    BatterySoc,
    BatteryVoltage,
    BatteryTempMax,
    HydraulicPressure,
    HydraulicOilTemp,
    SensorQualityScore,
    CanBusErrorRate,
    FuelLevel,
}

impl Metric {
    /// Every tracked metric, in canonical order.
    pub const ALL: [Metric; 13] = [
        Metric::EngineCoolantTemp,
        Metric::EngineOilPressure,
        Metric::EngineOilTemp,
        Metric::EngineRpm,
        Metric::BatterySoh,
        Metric::BatterySoc,
        Metric::BatteryVoltage,
        Metric::BatteryTempMax,
        Metric::HydraulicPressure,
        Metric::HydraulicOilTemp,
        Metric::SensorQualityScore,
        Metric::CanBusErrorRate,
        Metric::FuelLevel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::EngineCoolantTemp => METRIC_ENGINE_COOLANT_TEMP,
            Metric::EngineOilPressure => METRIC_ENGINE_OIL_PRESSURE,
            Metric::EngineOilTemp => "engine_oil_temp",
            Metric::EngineRpm => "engine_rpm",
            Metric::BatterySoh => METRIC_BATTERY_SOH,
            Metric::BatterySoc => "battery_soc",
            Metric::BatteryVoltage => "battery_voltage",
            Metric::BatteryTempMax => METRIC_BATTERY_TEMP_MAX,
            Metric::HydraulicPressure => METRIC_HYDRAULIC_PRESSURE,
            Metric::HydraulicOilTemp => "hydraulic_oil_temp",
            Metric::SensorQualityScore => METRIC_SENSOR_QUALITY_SCORE,
            Metric::CanBusErrorRate => "can_bus_error_rate",
            Metric::FuelLevel => "fuel_level",
        }
    }

    /// Resolve a flattened field name, including known bridge aliases.
    pub fn from_name(name: &str) -> Option<Metric> {
        if name == ALIAS_HYDRAULIC_SYSTEM_PRESSURE {
            return Some(Metric::HydraulicPressure);
        }
        Metric::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_name(s).ok_or_else(|| CoreError::Validation(format!("Unknown metric: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_name() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.as_str()), Some(metric));
        }
    }

    #[test]
    fn serde_name_matches_as_str() {
        for metric in Metric::ALL {
            let json = serde_json::to_value(metric).unwrap();
            assert_eq!(json, metric.as_str());
        }
    }

    #[test]
    fn hydraulic_alias_resolves() {
        assert_eq!(
            Metric::from_name("hydraulic_system_pressure"),
            Some(Metric::HydraulicPressure)
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(Metric::from_name("gnss_latitude").is_none());
        assert!("gnss_latitude".parse::<Metric>().is_err());
    }
}
