//! Per-vehicle decision engine.
//!
//! A [`VehicleEngine`] owns every [`MetricWindow`] of one vehicle and is the
//! unit of concurrency: exactly one worker task drives it. Each
//! [`VehicleEngine::ingest`] appends the snapshot to the windows and runs
//! scoring, anomaly detection and RUL estimation, then merges them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::anomaly::{self, AnomalyConfig, AnomalyResult};
use crate::error::CoreError;
use crate::forecast::{Forecaster, LinearExtrapolator};
use crate::health::HealthRules;
use crate::metric_names::Metric;
use crate::recommendation::{self, MaintenanceRecommendation};
use crate::rul::{RulConfig, RulPrediction};
use crate::snapshot::TelemetrySnapshot;
use crate::stats::EngineStats;
use crate::types::{Timestamp, VehicleId};
use crate::window::{MetricSample, MetricWindow, DEFAULT_WINDOW_CAPACITY};

/// Lifecycle of a vehicle engine. `Decommissioned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    Active,
    Decommissioned,
}

/// Tunables shared by every engine in a fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub window_capacity: usize,
    pub anomaly: AnomalyConfig,
    /// Metrics checked for anomalies on every ingest.
    pub anomaly_metrics: Vec<Metric>,
    /// Degradation indicators fed to the forecaster.
    pub rul_targets: Vec<RulConfig>,
    pub health_rules: HealthRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let health_rules = HealthRules::default();
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            anomaly: AnomalyConfig::default(),
            anomaly_metrics: health_rules.metrics(),
            rul_targets: vec![RulConfig::battery_soh()],
            health_rules,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.anomaly.validate()?;
        if self.window_capacity <= self.anomaly.window_size {
            return Err(CoreError::Validation(format!(
                "window_capacity ({}) must exceed the anomaly window_size ({})",
                self.window_capacity, self.anomaly.window_size
            )));
        }
        for target in &self.rul_targets {
            target.validate()?;
            if target.min_samples > self.window_capacity {
                return Err(CoreError::Validation(format!(
                    "RUL min_samples for {} exceeds window_capacity",
                    target.metric
                )));
            }
        }
        Ok(())
    }
}

pub struct VehicleEngine {
    vehicle_id: VehicleId,
    state: VehicleState,
    config: Arc<EngineConfig>,
    forecaster: Arc<dyn Forecaster>,
    windows: BTreeMap<Metric, MetricWindow>,
    last_timestamp: Option<Timestamp>,
    stats: EngineStats,
}

impl std::fmt::Debug for VehicleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleEngine")
            .field("vehicle_id", &self.vehicle_id)
            .field("state", &self.state)
            .field("forecaster", &self.forecaster.name())
            .field("windows", &self.windows.len())
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}

impl VehicleEngine {
    /// Create an active engine using linear extrapolation for RUL.
    pub fn new(vehicle_id: impl Into<VehicleId>, config: Arc<EngineConfig>) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            vehicle_id: vehicle_id.into(),
            state: VehicleState::Active,
            config,
            forecaster: Arc::new(LinearExtrapolator),
            windows: BTreeMap::new(),
            last_timestamp: None,
            stats: EngineStats::default(),
        })
    }

    /// Swap the RUL forecaster.
    pub fn with_forecaster(mut self, forecaster: Arc<dyn Forecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    /// Metrics that currently have a window, in canonical order.
    pub fn tracked_metrics(&self) -> Vec<Metric> {
        self.windows.keys().copied().collect()
    }

    /// Immutable copy of one metric's history.
    pub fn window_snapshot(&self, metric: Metric) -> Option<Vec<MetricSample>> {
        self.windows.get(&metric).map(MetricWindow::snapshot)
    }

    /// Move to `Decommissioned`. Fails if already retired.
    pub fn decommission(&mut self) -> Result<(), CoreError> {
        self.ensure_active()?;
        self.state = VehicleState::Decommissioned;
        Ok(())
    }

    /// Drop all history, e.g. after a component swap.
    pub fn reset_windows(&mut self) -> Result<(), CoreError> {
        self.ensure_active()?;
        self.windows.clear();
        self.last_timestamp = None;
        Ok(())
    }

    /// Append a snapshot and evaluate the vehicle.
    ///
    /// Validation failures leave every window untouched.
    pub fn ingest(
        &mut self,
        snapshot: &TelemetrySnapshot,
    ) -> Result<MaintenanceRecommendation, CoreError> {
        if let Err(e) = self.validate_snapshot(snapshot) {
            match e {
                CoreError::OutOfOrderSample { .. } => self.stats.out_of_order_rejections += 1,
                _ => self.stats.rejected_snapshots += 1,
            }
            return Err(e);
        }

        for (&metric, &value) in &snapshot.metrics {
            let capacity = self.config.window_capacity;
            self.windows
                .entry(metric)
                .or_insert_with(|| MetricWindow::new(metric, capacity))
                .append(MetricSample::new(snapshot.timestamp, value))?;
            self.stats.samples_appended += 1;
        }
        self.last_timestamp = Some(snapshot.timestamp);
        self.stats.snapshots_ingested += 1;

        let health = self.config.health_rules.score(&snapshot.metrics);
        let anomalies = self.detect_anomalies(snapshot);
        let rul = self.most_urgent_rul();

        let recommendation = recommendation::merge(
            &self.vehicle_id,
            snapshot.timestamp,
            &health,
            &anomalies,
            rul.as_ref(),
        );

        self.stats.recommendations_emitted += 1;
        if recommendation.action_required {
            self.stats.action_required_count += 1;
        }
        Ok(recommendation)
    }

    fn ensure_active(&self) -> Result<(), CoreError> {
        match self.state {
            VehicleState::Active => Ok(()),
            VehicleState::Decommissioned => Err(CoreError::VehicleRetired(self.vehicle_id.clone())),
        }
    }

    fn validate_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError> {
        self.ensure_active()?;
        if snapshot.vehicle_id != self.vehicle_id {
            return Err(CoreError::VehicleMismatch {
                expected: self.vehicle_id.clone(),
                actual: snapshot.vehicle_id.clone(),
            });
        }
        if let Some(last) = self.last_timestamp {
            if snapshot.timestamp <= last {
                return Err(CoreError::OutOfOrderSample {
                    metric: "snapshot".to_string(),
                    timestamp: snapshot.timestamp,
                    last,
                });
            }
        }
        Ok(())
    }

    /// Run the detector on configured metrics present in this snapshot.
    fn detect_anomalies(&self, snapshot: &TelemetrySnapshot) -> Vec<AnomalyResult> {
        self.config
            .anomaly_metrics
            .iter()
            .filter(|m| snapshot.metrics.contains_key(*m))
            .filter_map(|m| self.windows.get(m))
            .map(|window| anomaly::detect(window, &self.config.anomaly))
            .collect()
    }

    /// Forecast every degradation indicator and keep the one closest to
    /// failure. Without any estimate, the first prediction is kept.
    fn most_urgent_rul(&self) -> Option<RulPrediction> {
        let mut predictions = Vec::with_capacity(self.config.rul_targets.len());
        for target in &self.config.rul_targets {
            let Some(window) = self.windows.get(&target.metric) else {
                continue;
            };
            match self.forecaster.predict(&window.snapshot(), target) {
                Ok(prediction) => predictions.push(prediction),
                Err(e) => {
                    tracing::warn!(
                        vehicle_id = %self.vehicle_id,
                        metric = %target.metric,
                        error = %e,
                        "RUL forecast failed",
                    );
                }
            }
        }

        let most_urgent = predictions
            .iter()
            .filter(|p| p.method.has_estimate())
            .filter_map(|p| p.rul_time_estimate.map(|days| (days, p)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| p.clone());

        most_urgent.or_else(|| predictions.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
