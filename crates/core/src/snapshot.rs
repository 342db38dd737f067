//! Telemetry snapshot boundary.
//!
//! The ingestion bridge delivers one flat JSON record per reading:
//!
//! ```json
//! {
//!   "vehicle_id": "TRACTOR_001",
//!   "timestamp": "2025-01-01T08:00:00Z",
//!   "engine_coolant_temp": 86.5,
//!   "metrics": { "battery_soh": 94.2 }
//! }
//! ```
//!
//! Metric fields may sit at the top level or inside a `metrics` object.
//! When both carry the same metric the top-level reading is kept and the
//! nested one is reported as `metrics.<name>`.
//! Only names known to [`Metric`] with finite numeric values are kept;
//! everything else is dropped and reported back so the caller can log it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::metric_names::Metric;
use crate::types::{Timestamp, VehicleId};

const FIELD_VEHICLE_ID: &str = "vehicle_id";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_METRICS: &str = "metrics";

/// One timestamped reading of named metrics for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub vehicle_id: VehicleId,
    pub timestamp: Timestamp,
    pub metrics: BTreeMap<Metric, f64>,
}

/// A parsed snapshot plus the fields that were discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSnapshot {
    pub snapshot: TelemetrySnapshot,
    pub dropped_fields: Vec<String>,
}

impl TelemetrySnapshot {
    pub fn new(vehicle_id: impl Into<VehicleId>, timestamp: Timestamp) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            metrics: BTreeMap::new(),
        }
    }

    /// Add a reading. Non-finite values are ignored.
    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        if value.is_finite() {
            self.metrics.insert(metric, value);
        }
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }

    /// Parse a bridge record.
    ///
    /// Fails only when `vehicle_id` or `timestamp` is missing or malformed.
    pub fn from_json(value: &Value) -> Result<ParsedSnapshot, CoreError> {
        let object = value
            .as_object()
            .ok_or_else(|| CoreError::Validation("Snapshot must be a JSON object".to_string()))?;

        let vehicle_id = match object.get(FIELD_VEHICLE_ID) {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(_) => {
                return Err(CoreError::Validation(
                    "vehicle_id must be a non-empty string".to_string(),
                ))
            }
            None => return Err(CoreError::Validation("vehicle_id is required".to_string())),
        };

        let timestamp = match object.get(FIELD_TIMESTAMP) {
            Some(Value::String(raw)) => parse_timestamp(raw)?,
            Some(_) => {
                return Err(CoreError::Validation(
                    "timestamp must be an ISO-8601 string".to_string(),
                ))
            }
            None => return Err(CoreError::Validation("timestamp is required".to_string())),
        };

        let mut snapshot = TelemetrySnapshot::new(vehicle_id, timestamp);
        let mut dropped_fields = Vec::new();
        let mut nested = None;

        for (key, value) in object {
            match key.as_str() {
                FIELD_VEHICLE_ID | FIELD_TIMESTAMP => {}
                FIELD_METRICS => match value {
                    Value::Object(fields) => nested = Some(fields),
                    _ => dropped_fields.push(key.clone()),
                },
                _ => collect_metric(key, key, value, &mut snapshot, &mut dropped_fields),
            }
        }

        // Top-level readings take precedence over the nested object.
        if let Some(fields) = nested {
            collect_metrics(fields, &mut snapshot, &mut dropped_fields);
        }

        Ok(ParsedSnapshot {
            snapshot,
            dropped_fields,
        })
    }
}

fn collect_metrics(
    fields: &Map<String, Value>,
    snapshot: &mut TelemetrySnapshot,
    dropped: &mut Vec<String>,
) {
    for (key, value) in fields {
        let field = format!("{FIELD_METRICS}.{key}");
        collect_metric(key, &field, value, snapshot, dropped);
    }
}

/// Keep `value` under `key` unless it is unusable or the metric was already
/// read; otherwise report `field` as dropped.
fn collect_metric(
    key: &str,
    field: &str,
    value: &Value,
    snapshot: &mut TelemetrySnapshot,
    dropped: &mut Vec<String>,
) {
    let metric = Metric::from_name(key);
    let number = value.as_f64().filter(|v| v.is_finite());
    match (metric, number) {
        (Some(metric), Some(v)) if !snapshot.metrics.contains_key(&metric) => {
            snapshot.metrics.insert(metric, v);
        }
        _ => dropped.push(field.to_string()),
    }
}

/// RFC 3339, or a naive ISO-8601 date-time taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| CoreError::Validation(format!("Invalid timestamp: {raw}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
