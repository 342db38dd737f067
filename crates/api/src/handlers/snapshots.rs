//! Handler for telemetry ingestion.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fleethealth_core::types::{Timestamp, VehicleId};
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a `202 Accepted` ingestion response.
#[derive(Debug, Serialize)]
pub struct SnapshotAccepted {
    pub accepted: bool,
    pub vehicle_id: VehicleId,
    pub timestamp: Timestamp,
    pub dropped_fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// POST /snapshots
// ---------------------------------------------------------------------------

/// Queue one bridge snapshot for evaluation.
///
/// Evaluation is asynchronous; the recommendation appears on the vehicle's
/// `/recommendation` endpoint once the worker has processed it. A full
/// vehicle queue answers `429 QUEUE_FULL` and the snapshot is discarded.
pub async fn ingest_snapshot(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let receipt = state.fleet.submit_json(&body).await?;

    tracing::debug!(
        vehicle_id = %receipt.vehicle_id,
        timestamp = %receipt.timestamp,
        dropped_fields = receipt.dropped_fields.len(),
        "Snapshot accepted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SnapshotAccepted {
                accepted: true,
                vehicle_id: receipt.vehicle_id,
                timestamp: receipt.timestamp,
                dropped_fields: receipt.dropped_fields,
            },
        }),
    ))
}
