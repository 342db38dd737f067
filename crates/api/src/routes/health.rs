use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `shutting_down` once the fleet stops accepting work.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Vehicles with a running worker.
    pub vehicles: usize,
    /// Live subscribers on the event bus.
    pub event_subscribers: usize,
}

/// GET /health -- service status and fleet size.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.fleet.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        vehicles: state.fleet.vehicle_count().await,
        event_subscribers: state.event_bus.subscriber_count(),
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
