//! Route definitions for per-vehicle reads and lifecycle.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::vehicles;
use crate::state::AppState;

/// Routes mounted at `/vehicles`.
///
/// ```text
/// GET   /                          -> list_vehicles
/// GET   /{id}/recommendation       -> get_recommendation
/// GET   /{id}/stats                -> get_stats
/// GET   /{id}/windows/{metric}     -> get_window
/// POST  /{id}/decommission         -> decommission_vehicle
/// POST  /{id}/reset-windows        -> reset_windows
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(vehicles::list_vehicles))
        .route("/{id}/recommendation", get(vehicles::get_recommendation))
        .route("/{id}/stats", get(vehicles::get_stats))
        .route("/{id}/windows/{metric}", get(vehicles::get_window))
        .route("/{id}/decommission", post(vehicles::decommission_vehicle))
        .route("/{id}/reset-windows", post(vehicles::reset_windows))
}
