use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleethealth_core::error::CoreError;
use fleethealth_worker::FleetError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`FleetError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `fleethealth_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A routing or backpressure error from the fleet supervisor.
    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Fleet(fleet) => match fleet {
                FleetError::Core(core) => classify_core_error(core),
                FleetError::QueueFull(_) => {
                    (StatusCode::TOO_MANY_REQUESTS, "QUEUE_FULL", fleet.to_string())
                }
                FleetError::UnknownVehicle(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", fleet.to_string())
                }
                FleetError::WorkerStopped(_) => {
                    tracing::error!(error = %fleet, "Vehicle worker unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "WORKER_UNAVAILABLE",
                        fleet.to_string(),
                    )
                }
                FleetError::ShuttingDown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SHUTTING_DOWN",
                    fleet.to_string(),
                ),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an engine error to an HTTP status, error code and message.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::VehicleMismatch { .. } => {
            (StatusCode::BAD_REQUEST, "VEHICLE_MISMATCH", err.to_string())
        }
        CoreError::OutOfOrderSample { .. } => {
            (StatusCode::CONFLICT, "OUT_OF_ORDER", err.to_string())
        }
        CoreError::VehicleRetired(_) => (StatusCode::CONFLICT, "VEHICLE_RETIRED", err.to_string()),
    }
}
