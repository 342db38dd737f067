//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the fleet supervisor,
//! every vehicle worker and downstream subscribers (recommendation sink,
//! notification collaborators).

use chrono::{DateTime, Utc};
use fleethealth_core::types::VehicleId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names published on the bus.
pub mod event_types {
    /// A vehicle worker produced a [`MaintenanceRecommendation`](fleethealth_core::recommendation::MaintenanceRecommendation).
    pub const MAINTENANCE_RECOMMENDATION: &str = "maintenance.recommendation";
    /// A vehicle was retired.
    pub const VEHICLE_DECOMMISSIONED: &str = "vehicle.decommissioned";
    /// A snapshot was discarded because the vehicle's queue was full.
    pub const SNAPSHOT_DROPPED: &str = "snapshot.dropped";
    /// The engine refused a snapshot (retired, out of order, mismatched).
    pub const SNAPSHOT_REJECTED: &str = "snapshot.rejected";
}

// ---------------------------------------------------------------------------
// FleetEvent
// ---------------------------------------------------------------------------

/// Something that happened to a vehicle in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,

    pub vehicle_id: Option<VehicleId>,

    /// Event-specific data; a serialized recommendation for
    /// `maintenance.recommendation`.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl FleetEvent {
    /// Create an event with an empty payload and no vehicle.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            vehicle_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_vehicle(mut self, vehicle_id: impl Into<VehicleId>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use fleethealth_events::bus::{EventBus, FleetEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(FleetEvent::new("vehicle.decommissioned").with_vehicle("TRACTOR_001"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<FleetEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when nobody
    /// is listening.
    pub fn publish(&self, event: FleetEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = FleetEvent::new(event_types::VEHICLE_DECOMMISSIONED)
            .with_vehicle("TRACTOR_001")
            .with_payload(serde_json::json!({"reason": "sold"}));
        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert!(received.is(event_types::VEHICLE_DECOMMISSIONED));
        assert_eq!(received.vehicle_id.as_deref(), Some("TRACTOR_001"));
        assert_eq!(received.payload["reason"], "sold");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(FleetEvent::new(event_types::SNAPSHOT_DROPPED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, "snapshot.dropped");
        assert_eq!(e2.event_type, "snapshot.dropped");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(FleetEvent::new("orphan.event"));
    }

    #[test]
    fn new_event_has_empty_optional_fields() {
        let event = FleetEvent::new("bare.event");
        assert!(event.vehicle_id.is_none());
        assert!(event.payload.is_object());
    }
}
