//! Fleet event bus and recommendation fan-out.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`FleetEvent`]: the event envelope published by vehicle workers.
//! - [`RecommendationSink`]: background subscriber that writes every
//!   maintenance recommendation as a JSON line.

pub mod bus;
pub mod sink;

pub use bus::{event_types, EventBus, FleetEvent};
pub use sink::RecommendationSink;
