//! Fleet supervisor.
//!
//! [`Fleet`] spawns a [`VehicleWorker`] the first time a vehicle is seen and
//! keeps only handles; it never touches engine state itself. Different
//! vehicles share nothing mutable, so they are evaluated in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleethealth_core::error::CoreError;
use fleethealth_core::forecast::{Forecaster, LinearExtrapolator};
use fleethealth_core::metric_names::Metric;
use fleethealth_core::recommendation::{MaintenanceRecommendation, Priority};
use fleethealth_core::snapshot::TelemetrySnapshot;
use fleethealth_core::stats::EngineStats;
use fleethealth_core::types::{Timestamp, VehicleId};
use fleethealth_core::vehicle::{EngineConfig, VehicleEngine, VehicleState};
use fleethealth_core::window::MetricSample;
use fleethealth_events::{event_types, EventBus, FleetEvent};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::actor::{VehicleHandle, VehicleWorker};
use crate::config::WorkerConfig;
use crate::error::FleetError;

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub vehicle_id: VehicleId,
    pub timestamp: Timestamp,
    /// Input fields that were not recognised as metrics.
    pub dropped_fields: Vec<String>,
}

/// Counters for one vehicle, engine-side and queue-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleStats {
    pub vehicle_id: VehicleId,
    pub state: VehicleState,
    #[serde(flatten)]
    pub engine: EngineStats,
    pub snapshots_dropped: u64,
    pub queue_depth: usize,
    pub last_timestamp: Option<Timestamp>,
    pub tracked_metrics: Vec<Metric>,
}

/// One row of the fleet listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummary {
    pub vehicle_id: VehicleId,
    pub state: VehicleState,
    pub snapshots_dropped: u64,
    pub latest_priority: Option<Priority>,
    pub latest_health_score: Option<f64>,
    pub action_required: bool,
}

pub struct Fleet {
    vehicles: RwLock<HashMap<VehicleId, VehicleHandle>>,
    engine_config: Arc<EngineConfig>,
    queue_capacity: usize,
    shutdown_timeout: Duration,
    forecaster: Arc<dyn Forecaster>,
    event_bus: Arc<EventBus>,
    /// Master token; every worker gets a child.
    cancel: CancellationToken,
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("engine_config", &self.engine_config)
            .field("queue_capacity", &self.queue_capacity)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl Fleet {
    /// Build a fleet using linear extrapolation for RUL.
    pub fn new(config: WorkerConfig, event_bus: Arc<EventBus>) -> Result<Arc<Self>, FleetError> {
        Self::with_forecaster(config, event_bus, Arc::new(LinearExtrapolator))
    }

    pub fn with_forecaster(
        config: WorkerConfig,
        event_bus: Arc<EventBus>,
        forecaster: Arc<dyn Forecaster>,
    ) -> Result<Arc<Self>, FleetError> {
        config.engine.validate()?;
        if config.queue_capacity == 0 {
            return Err(CoreError::Validation("queue_capacity must be positive".to_string()).into());
        }
        tracing::info!(
            queue_capacity = config.queue_capacity,
            window_capacity = config.engine.window_capacity,
            forecaster = forecaster.name(),
            "Fleet supervisor created",
        );
        Ok(Arc::new(Self {
            vehicles: RwLock::new(HashMap::new()),
            engine_config: Arc::new(config.engine),
            queue_capacity: config.queue_capacity,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            forecaster,
            event_bus,
            cancel: CancellationToken::new(),
        }))
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn vehicle_count(&self) -> usize {
        self.vehicles.read().await.len()
    }

    // ---- ingestion ----

    /// Route a snapshot to its vehicle without waiting.
    ///
    /// When the vehicle's queue is full the snapshot is dropped, counted and
    /// announced as `snapshot.dropped`.
    pub async fn submit(&self, snapshot: TelemetrySnapshot) -> Result<(), FleetError> {
        self.ensure_running()?;
        self.ensure_worker(&snapshot.vehicle_id).await?;

        let vehicles = self.vehicles.read().await;
        let handle = Self::handle(&vehicles, &snapshot.vehicle_id)?;
        let vehicle_id = snapshot.vehicle_id.clone();
        let timestamp = snapshot.timestamp;

        let result = handle.try_submit(snapshot);
        if let Err(FleetError::QueueFull(_)) = &result {
            tracing::warn!(
                vehicle_id = %vehicle_id,
                %timestamp,
                dropped_total = handle.snapshots_dropped(),
                "Snapshot queue full, dropping newest snapshot",
            );
            self.event_bus.publish(
                FleetEvent::new(event_types::SNAPSHOT_DROPPED)
                    .with_vehicle(vehicle_id)
                    .with_payload(json!({
                        "timestamp": timestamp,
                        "dropped_total": handle.snapshots_dropped(),
                    })),
            );
        }
        result
    }

    /// Route a snapshot, waiting for queue space instead of dropping.
    ///
    /// Used for replay, where the input can be paced by the consumer.
    pub async fn submit_wait(&self, snapshot: TelemetrySnapshot) -> Result<(), FleetError> {
        self.ensure_running()?;
        self.ensure_worker(&snapshot.vehicle_id).await?;

        // Wait for queue space without holding the vehicle map.
        let sender = {
            let vehicles = self.vehicles.read().await;
            let handle = Self::handle(&vehicles, &snapshot.vehicle_id)?;
            handle.sender()?
        };
        sender
            .send(snapshot)
            .await
            .map_err(|e| FleetError::WorkerStopped(e.0.vehicle_id))
    }

    /// Parse a raw bridge record and [`submit`](Self::submit) it.
    pub async fn submit_json(&self, raw: &serde_json::Value) -> Result<SubmitReceipt, FleetError> {
        let parsed = TelemetrySnapshot::from_json(raw)?;
        let receipt = receipt_for(&parsed.snapshot, parsed.dropped_fields);
        self.submit(parsed.snapshot).await?;
        Ok(receipt)
    }

    // ---- control ----

    /// Retire a vehicle. One-way; a second call fails with `VehicleRetired`.
    pub async fn decommission(&self, vehicle_id: &str) -> Result<(), FleetError> {
        let vehicles = self.vehicles.read().await;
        Self::handle(&vehicles, vehicle_id)?.decommission().await
    }

    pub async fn reset_windows(&self, vehicle_id: &str) -> Result<(), FleetError> {
        let vehicles = self.vehicles.read().await;
        Self::handle(&vehicles, vehicle_id)?.reset_windows().await
    }

    /// Wait until every snapshot queued so far has been evaluated.
    pub async fn flush(&self) -> Result<(), FleetError> {
        let vehicles = self.vehicles.read().await;
        for handle in vehicles.values() {
            handle.flush().await?;
        }
        Ok(())
    }

    // ---- reads ----

    pub async fn latest(&self, vehicle_id: &str) -> Result<Option<MaintenanceRecommendation>, FleetError> {
        let vehicles = self.vehicles.read().await;
        Ok(Self::handle(&vehicles, vehicle_id)?.latest())
    }

    /// Receiver that observes every new recommendation for `vehicle_id`.
    pub async fn watch(
        &self,
        vehicle_id: &str,
    ) -> Result<watch::Receiver<Option<MaintenanceRecommendation>>, FleetError> {
        let vehicles = self.vehicles.read().await;
        Ok(Self::handle(&vehicles, vehicle_id)?.watch())
    }

    /// Immutable copy of one metric window, `None` if never reported.
    pub async fn window(
        &self,
        vehicle_id: &str,
        metric: Metric,
    ) -> Result<Option<Vec<MetricSample>>, FleetError> {
        let vehicles = self.vehicles.read().await;
        Self::handle(&vehicles, vehicle_id)?.window(metric).await
    }

    pub async fn stats(&self, vehicle_id: &str) -> Result<VehicleStats, FleetError> {
        let vehicles = self.vehicles.read().await;
        let handle = Self::handle(&vehicles, vehicle_id)?;
        let status = handle.status().await?;
        Ok(VehicleStats {
            vehicle_id: vehicle_id.to_string(),
            state: status.state,
            engine: status.stats,
            snapshots_dropped: handle.snapshots_dropped(),
            queue_depth: handle.queue_depth(),
            last_timestamp: status.last_timestamp,
            tracked_metrics: status.tracked_metrics,
        })
    }

    /// Every known vehicle, sorted by id.
    pub async fn list(&self) -> Vec<VehicleSummary> {
        let vehicles = self.vehicles.read().await;
        let mut summaries: Vec<VehicleSummary> = vehicles
            .values()
            .map(|handle| {
                let latest = handle.latest();
                VehicleSummary {
                    vehicle_id: handle.vehicle_id().to_string(),
                    state: if handle.is_retired() {
                        VehicleState::Decommissioned
                    } else {
                        VehicleState::Active
                    },
                    snapshots_dropped: handle.snapshots_dropped(),
                    latest_priority: latest.as_ref().map(|r| r.priority),
                    latest_health_score: latest.as_ref().map(|r| r.health_score),
                    action_required: latest.as_ref().is_some_and(|r| r.action_required),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        summaries
    }

    // ---- lifecycle ----

    /// Stop accepting work and stop every worker.
    ///
    /// Cancels the master token, then waits up to the configured timeout
    /// per worker. Queued snapshots are not evaluated.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down fleet");
        self.cancel.cancel();

        let mut vehicles = self.vehicles.write().await;
        let count = vehicles.len();
        for (_, handle) in vehicles.drain() {
            handle.shutdown(self.shutdown_timeout).await;
        }
        tracing::info!(workers = count, "Fleet shut down complete");
    }

    // ---- private helpers ----

    fn ensure_running(&self) -> Result<(), FleetError> {
        if self.cancel.is_cancelled() {
            return Err(FleetError::ShuttingDown);
        }
        Ok(())
    }

    fn handle<'a>(
        vehicles: &'a HashMap<VehicleId, VehicleHandle>,
        vehicle_id: &str,
    ) -> Result<&'a VehicleHandle, FleetError> {
        vehicles
            .get(vehicle_id)
            .ok_or_else(|| FleetError::UnknownVehicle(vehicle_id.to_string()))
    }

    /// Spawn a worker for `vehicle_id` unless one exists.
    async fn ensure_worker(&self, vehicle_id: &str) -> Result<(), FleetError> {
        if self.vehicles.read().await.contains_key(vehicle_id) {
            return Ok(());
        }

        let mut vehicles = self.vehicles.write().await;
        if vehicles.contains_key(vehicle_id) {
            return Ok(());
        }
        self.ensure_running()?;

        let engine = VehicleEngine::new(vehicle_id, Arc::clone(&self.engine_config))?
            .with_forecaster(Arc::clone(&self.forecaster));
        let handle = VehicleWorker::spawn(
            engine,
            self.queue_capacity,
            Arc::clone(&self.event_bus),
            self.cancel.child_token(),
        );
        vehicles.insert(vehicle_id.to_string(), handle);
        tracing::info!(vehicle_id, fleet_size = vehicles.len(), "Vehicle worker spawned");
        Ok(())
    }
}

fn receipt_for(snapshot: &TelemetrySnapshot, dropped_fields: Vec<String>) -> SubmitReceipt {
    if !dropped_fields.is_empty() {
        tracing::debug!(
            vehicle_id = %snapshot.vehicle_id,
            dropped = ?dropped_fields,
            "Dropped non-metric snapshot fields",
        );
    }
    SubmitReceipt {
        vehicle_id: snapshot.vehicle_id.clone(),
        timestamp: snapshot.timestamp,
        dropped_fields,
    }
}
