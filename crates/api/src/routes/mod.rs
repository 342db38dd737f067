pub mod health;
pub mod vehicles;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /snapshots                                       ingest one snapshot (POST)
///
/// /vehicles                                        fleet listing
/// /vehicles/{id}/recommendation                    latest recommendation
/// /vehicles/{id}/stats                             engine and queue counters
/// /vehicles/{id}/windows/{metric}                  metric window copy
/// /vehicles/{id}/decommission                      retire vehicle (POST)
/// /vehicles/{id}/reset-windows                     clear history (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/snapshots", post(handlers::snapshots::ingest_snapshot))
        .nest("/vehicles", vehicles::router())
}
