//! Per-vehicle workers and the fleet supervisor.
//!
//! Every vehicle is driven by exactly one [`actor::VehicleWorker`] task that
//! owns its [`VehicleEngine`](fleethealth_core::vehicle::VehicleEngine).
//! [`fleet::Fleet`] routes snapshots to workers over bounded queues and
//! answers read requests by messaging the owning worker.

pub mod actor;
pub mod config;
pub mod error;
pub mod fleet;

pub use config::WorkerConfig;
pub use error::FleetError;
pub use fleet::{Fleet, SubmitReceipt, VehicleStats, VehicleSummary};
