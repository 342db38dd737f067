#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use fleethealth_api::config::ServerConfig;
use fleethealth_api::router::build_app_router;
use fleethealth_api::state::AppState;
use fleethealth_events::EventBus;
use fleethealth_worker::{Fleet, WorkerConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(worker: WorkerConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        recommendation_log_path: None,
        worker,
    }
}

/// Application under test plus a handle on its fleet.
pub struct TestApp {
    pub router: Router,
    pub fleet: Arc<Fleet>,
    pub event_bus: Arc<EventBus>,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(WorkerConfig::default())
}

pub fn build_test_app_with(worker: WorkerConfig) -> TestApp {
    let config = test_config(worker);
    let event_bus = Arc::new(EventBus::default());
    let fleet = Fleet::new(config.worker.clone(), Arc::clone(&event_bus)).unwrap();

    let state = AppState {
        config: Arc::new(config.clone()),
        fleet: Arc::clone(&fleet),
        event_bus: Arc::clone(&event_bus),
    };

    TestApp {
        router: build_app_router(state, &config),
        fleet,
        event_bus,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A bridge record with all-normal readings at `hour` past midnight.
pub fn normal_snapshot(vehicle_id: &str, hour: i64) -> serde_json::Value {
    let timestamp = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour);
    serde_json::json!({
        "vehicle_id": vehicle_id,
        "timestamp": timestamp.to_rfc3339(),
        "engine_coolant_temp": 85.0,
        "engine_oil_pressure": 4.5,
        "metrics": { "battery_soh": 95.0 },
    })
}
