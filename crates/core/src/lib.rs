//! Per-vehicle health scoring and predictive-maintenance decision engine.
//!
//! Everything in this crate is pure, synchronous logic with no I/O. The
//! worker crate owns one [`vehicle::VehicleEngine`] per vehicle and feeds it
//! parsed [`snapshot::TelemetrySnapshot`]s; each ingest produces a
//! [`recommendation::MaintenanceRecommendation`].
//!
//! Leaf-first:
//!
//! - [`window`]: bounded, time-ordered sample history per metric.
//! - [`anomaly`]: rolling z-score verdict for the newest sample.
//! - [`health`]: rule-based composite health score.
//! - [`rul`]: least-squares remaining-useful-life estimate.
//! - [`forecast`]: pluggable forecaster capability wrapping [`rul`].
//! - [`recommendation`]: priority merge of all signals.
//! - [`vehicle`]: the per-vehicle state machine tying them together.

pub mod anomaly;
pub mod error;
pub mod forecast;
pub mod health;
pub mod metric_names;
pub mod recommendation;
pub mod rul;
pub mod snapshot;
pub mod stats;
pub mod types;
pub mod vehicle;
pub mod window;
