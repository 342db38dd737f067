use crate::types::{Timestamp, VehicleId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Out-of-order sample for {metric}: {timestamp} is not after {last}")]
    OutOfOrderSample {
        metric: String,
        timestamp: Timestamp,
        last: Timestamp,
    },

    #[error("Vehicle mismatch: engine for {expected} received snapshot for {actual}")]
    VehicleMismatch {
        expected: VehicleId,
        actual: VehicleId,
    },

    #[error("Vehicle {0} is decommissioned")]
    VehicleRetired(VehicleId),

    #[error("Validation failed: {0}")]
    Validation(String),
}
