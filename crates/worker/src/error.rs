use fleethealth_core::error::CoreError;
use fleethealth_core::types::VehicleId;

/// Errors raised while routing work to vehicle workers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FleetError {
    /// A domain-level error from the vehicle engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Drop-newest backpressure discarded the snapshot.
    #[error("Snapshot queue for vehicle {0} is full; snapshot dropped")]
    QueueFull(VehicleId),

    #[error("Vehicle {0} is not known to the fleet")]
    UnknownVehicle(VehicleId),

    /// The worker task exited (panic or shutdown) before answering.
    #[error("Worker for vehicle {0} has stopped")]
    WorkerStopped(VehicleId),

    #[error("Fleet is shutting down")]
    ShuttingDown,
}
