//! Handlers for per-vehicle reads and lifecycle.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use fleethealth_core::metric_names::Metric;
use fleethealth_core::types::VehicleId;
use fleethealth_core::vehicle::VehicleState;
use fleethealth_core::window::MetricSample;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub vehicle_id: VehicleId,
    pub metric: Metric,
    pub samples: Vec<MetricSample>,
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub vehicle_id: VehicleId,
    pub state: VehicleState,
}

// ---------------------------------------------------------------------------
// GET /vehicles
// ---------------------------------------------------------------------------

/// List every vehicle the fleet has seen, sorted by id.
pub async fn list_vehicles(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let vehicles = state.fleet.list().await;
    Ok(Json(DataResponse { data: vehicles }))
}

// ---------------------------------------------------------------------------
// GET /vehicles/{id}/recommendation
// ---------------------------------------------------------------------------

pub async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> AppResult<impl IntoResponse> {
    let recommendation = state
        .fleet
        .latest(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No recommendation yet for vehicle {id}")))?;
    Ok(Json(DataResponse {
        data: recommendation,
    }))
}

// ---------------------------------------------------------------------------
// GET /vehicles/{id}/stats
// ---------------------------------------------------------------------------

pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> AppResult<impl IntoResponse> {
    let stats = state.fleet.stats(&id).await?;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// GET /vehicles/{id}/windows/{metric}
// ---------------------------------------------------------------------------

/// Copy of one metric's history, oldest first.
pub async fn get_window(
    State(state): State<AppState>,
    Path((id, metric)): Path<(VehicleId, String)>,
) -> AppResult<impl IntoResponse> {
    let metric: Metric = metric.parse()?;
    let samples = state.fleet.window(&id, metric).await?.ok_or_else(|| {
        AppError::NotFound(format!("Vehicle {id} has not reported {metric}"))
    })?;
    Ok(Json(DataResponse {
        data: WindowResponse {
            vehicle_id: id,
            metric,
            samples,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /vehicles/{id}/decommission
// ---------------------------------------------------------------------------

/// Retire a vehicle. Later snapshots are refused with `409 VEHICLE_RETIRED`.
pub async fn decommission_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> AppResult<impl IntoResponse> {
    state.fleet.decommission(&id).await?;
    tracing::info!(vehicle_id = %id, "Vehicle decommissioned via API");
    Ok(Json(DataResponse {
        data: LifecycleResponse {
            vehicle_id: id,
            state: VehicleState::Decommissioned,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /vehicles/{id}/reset-windows
// ---------------------------------------------------------------------------

/// Clear every metric window, e.g. after a component replacement.
pub async fn reset_windows(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> AppResult<impl IntoResponse> {
    state.fleet.reset_windows(&id).await?;
    tracing::info!(vehicle_id = %id, "Vehicle windows reset via API");
    Ok(Json(DataResponse {
        data: LifecycleResponse {
            vehicle_id: id,
            state: VehicleState::Active,
        },
    }))
}
