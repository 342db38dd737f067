use std::sync::Arc;

use fleethealth_events::EventBus;
use fleethealth_worker::Fleet;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Supervisor owning every vehicle worker.
    pub fleet: Arc<Fleet>,
    /// Event bus the workers publish recommendations on.
    pub event_bus: Arc<EventBus>,
}
