//! One task per vehicle.
//!
//! A [`VehicleWorker`] is the single writer of its engine. Snapshots arrive
//! on a bounded queue filled with `try_send`, so a slow vehicle sheds load
//! (drop-newest) instead of stalling ingestion. Control requests travel on a
//! separate queue with awaited sends and are answered over `oneshot`
//! channels. Reads are served ahead of queued snapshots; lifecycle commands
//! first evaluate every snapshot accepted before them. The latest
//! recommendation is published through a `watch` channel so readers never
//! touch engine state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleethealth_core::error::CoreError;
use fleethealth_core::metric_names::Metric;
use fleethealth_core::recommendation::MaintenanceRecommendation;
use fleethealth_core::snapshot::TelemetrySnapshot;
use fleethealth_core::stats::EngineStats;
use fleethealth_core::types::{Timestamp, VehicleId};
use fleethealth_core::vehicle::{VehicleEngine, VehicleState};
use fleethealth_core::window::MetricSample;
use fleethealth_events::{event_types, EventBus, FleetEvent};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::FleetError;

/// Depth of the control queue. Control senders await, so this only bounds
/// how many requests may be in flight at once.
const CONTROL_QUEUE_CAPACITY: usize = 8;

/// Point-in-time view of an engine, produced by its worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub state: VehicleState,
    pub stats: EngineStats,
    pub last_timestamp: Option<Timestamp>,
    pub tracked_metrics: Vec<Metric>,
}

pub(crate) enum Control {
    Decommission(oneshot::Sender<Result<(), CoreError>>),
    ResetWindows(oneshot::Sender<Result<(), CoreError>>),
    Window {
        metric: Metric,
        reply: oneshot::Sender<Option<Vec<MetricSample>>>,
    },
    Status(oneshot::Sender<EngineStatus>),
    /// Evaluate every snapshot already queued, then reply.
    Flush(oneshot::Sender<()>),
}

// ---------------------------------------------------------------------------
// VehicleWorker
// ---------------------------------------------------------------------------

pub struct VehicleWorker {
    engine: VehicleEngine,
    snapshots: mpsc::Receiver<TelemetrySnapshot>,
    control: mpsc::Receiver<Control>,
    latest: watch::Sender<Option<MaintenanceRecommendation>>,
    retired: Arc<AtomicBool>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl VehicleWorker {
    /// Spawn the worker task and return the handle used to reach it.
    pub fn spawn(
        engine: VehicleEngine,
        queue_capacity: usize,
        event_bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> VehicleHandle {
        let vehicle_id = engine.vehicle_id().to_string();
        let retired = Arc::new(AtomicBool::new(engine.state() == VehicleState::Decommissioned));
        let (snapshot_tx, snapshot_rx) = mpsc::channel(queue_capacity.max(1));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (latest_tx, latest_rx) = watch::channel(None);

        let worker = Self {
            engine,
            snapshots: snapshot_rx,
            control: control_rx,
            latest: latest_tx,
            retired: Arc::clone(&retired),
            event_bus,
            cancel: cancel.clone(),
        };

        let span = tracing::info_span!("vehicle_worker", vehicle_id = %vehicle_id);
        let task = tokio::spawn(worker.run().instrument(span));

        VehicleHandle {
            vehicle_id,
            snapshots: snapshot_tx,
            control: control_tx,
            latest: latest_rx,
            dropped: Arc::new(AtomicU64::new(0)),
            retired,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        tracing::debug!("Vehicle worker started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!(pending = self.snapshots.len(), "Vehicle worker cancelled");
                    break;
                }
                command = self.control.recv() => match command {
                    Some(command) => self.handle_control(command),
                    None => break,
                },
                snapshot = self.snapshots.recv() => match snapshot {
                    Some(snapshot) => self.handle_snapshot(snapshot),
                    None => break,
                },
            }
        }
        tracing::debug!(stats = ?self.engine.stats(), "Vehicle worker stopped");
    }

    fn handle_snapshot(&mut self, snapshot: TelemetrySnapshot) {
        match self.engine.ingest(&snapshot) {
            Ok(recommendation) => {
                tracing::debug!(
                    timestamp = %recommendation.timestamp,
                    health_score = recommendation.health_score,
                    priority = %recommendation.priority,
                    action_required = recommendation.action_required,
                    "Snapshot evaluated",
                );
                match serde_json::to_value(&recommendation) {
                    Ok(payload) => self.publish(event_types::MAINTENANCE_RECOMMENDATION, payload),
                    Err(e) => tracing::error!(error = %e, "Failed to serialize recommendation"),
                }
                self.latest.send_replace(Some(recommendation));
            }
            Err(e) => {
                tracing::warn!(timestamp = %snapshot.timestamp, error = %e, "Snapshot rejected");
                self.publish(
                    event_types::SNAPSHOT_REJECTED,
                    json!({ "timestamp": snapshot.timestamp, "error": e.to_string() }),
                );
            }
        }
    }

    fn handle_control(&mut self, command: Control) {
        match command {
            Control::Decommission(reply) => {
                self.drain_pending();
                let result = self.engine.decommission();
                if result.is_ok() {
                    self.retired.store(true, Ordering::Release);
                    tracing::info!("Vehicle decommissioned");
                    self.publish(
                        event_types::VEHICLE_DECOMMISSIONED,
                        json!({ "stats": self.engine.stats() }),
                    );
                }
                let _ = reply.send(result);
            }
            Control::ResetWindows(reply) => {
                self.drain_pending();
                let result = self.engine.reset_windows();
                if result.is_ok() {
                    tracing::info!("Vehicle windows reset");
                }
                let _ = reply.send(result);
            }
            Control::Window { metric, reply } => {
                let _ = reply.send(self.engine.window_snapshot(metric));
            }
            Control::Status(reply) => {
                let _ = reply.send(EngineStatus {
                    state: self.engine.state(),
                    stats: self.engine.stats(),
                    last_timestamp: self.engine.last_timestamp(),
                    tracked_metrics: self.engine.tracked_metrics(),
                });
            }
            Control::Flush(reply) => {
                self.drain_pending();
                let _ = reply.send(());
            }
        }
    }

    /// Evaluate every snapshot already sitting in the queue.
    fn drain_pending(&mut self) {
        while let Ok(snapshot) = self.snapshots.try_recv() {
            self.handle_snapshot(snapshot);
        }
    }

    fn publish(&self, event_type: &str, payload: serde_json::Value) {
        self.event_bus.publish(
            FleetEvent::new(event_type)
                .with_vehicle(self.engine.vehicle_id())
                .with_payload(payload),
        );
    }
}

// ---------------------------------------------------------------------------
// VehicleHandle
// ---------------------------------------------------------------------------

/// Supervisor-side handle to one worker.
pub struct VehicleHandle {
    vehicle_id: VehicleId,
    snapshots: mpsc::Sender<TelemetrySnapshot>,
    control: mpsc::Sender<Control>,
    latest: watch::Receiver<Option<MaintenanceRecommendation>>,
    dropped: Arc<AtomicU64>,
    retired: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl VehicleHandle {
    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Snapshots discarded by backpressure so far.
    pub fn snapshots_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Snapshots waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.snapshots.max_capacity() - self.snapshots.capacity()
    }

    pub fn latest(&self) -> Option<MaintenanceRecommendation> {
        self.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<MaintenanceRecommendation>> {
        self.latest.clone()
    }

    /// Enqueue without waiting. A full queue drops `snapshot` and counts it.
    pub fn try_submit(&self, snapshot: TelemetrySnapshot) -> Result<(), FleetError> {
        self.ensure_active()?;
        match self.snapshots.try_send(snapshot) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(FleetError::QueueFull(self.vehicle_id.clone()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(FleetError::WorkerStopped(self.vehicle_id.clone()))
            }
        }
    }

    /// Sender for awaited submission that outlives a borrow of the handle.
    pub fn sender(&self) -> Result<mpsc::Sender<TelemetrySnapshot>, FleetError> {
        self.ensure_active()?;
        Ok(self.snapshots.clone())
    }

    pub async fn decommission(&self) -> Result<(), FleetError> {
        self.request(Control::Decommission).await??;
        Ok(())
    }

    pub async fn reset_windows(&self) -> Result<(), FleetError> {
        self.request(Control::ResetWindows).await??;
        Ok(())
    }

    pub async fn window(&self, metric: Metric) -> Result<Option<Vec<MetricSample>>, FleetError> {
        self.request(|reply| Control::Window { metric, reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, FleetError> {
        self.request(Control::Status).await
    }

    pub async fn flush(&self) -> Result<(), FleetError> {
        self.request(Control::Flush).await
    }

    /// Cancel the worker and wait up to `timeout` for it to exit.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(timeout, self.task).await.is_err() {
            tracing::warn!(vehicle_id = %self.vehicle_id, "Vehicle worker did not stop in time");
        }
    }

    fn ensure_active(&self) -> Result<(), FleetError> {
        if self.is_retired() {
            return Err(CoreError::VehicleRetired(self.vehicle_id.clone()).into());
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Result<T, FleetError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(make(reply_tx))
            .await
            .map_err(|_| FleetError::WorkerStopped(self.vehicle_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| FleetError::WorkerStopped(self.vehicle_id.clone()))
    }
}

impl std::fmt::Debug for VehicleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleHandle")
            .field("vehicle_id", &self.vehicle_id)
            .field("retired", &self.is_retired())
            .field("dropped", &self.snapshots_dropped())
            .finish()
    }
}
