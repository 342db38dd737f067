//! Recommendation fan-out to a line-oriented writer.
//!
//! [`RecommendationSink`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes the payload of every `maintenance.recommendation` event as one
//! JSON line. It runs as a background task and exits once the bus is
//! dropped.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use crate::bus::{event_types, FleetEvent};

/// Background service writing recommendations as JSON lines.
pub struct RecommendationSink;

impl RecommendationSink {
    /// Run the sink loop until the channel closes or the writer fails.
    ///
    /// Returns the number of recommendations written.
    pub async fn run<W>(mut writer: W, mut receiver: broadcast::Receiver<FleetEvent>) -> u64
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        loop {
            match receiver.recv().await {
                Ok(event) if event.is(event_types::MAINTENANCE_RECOMMENDATION) => {
                    Self::log_recommendation(&event);
                    if let Err(e) = Self::write_line(&mut writer, &event.payload).await {
                        tracing::error!(error = %e, "Failed to write recommendation, sink stopping");
                        break;
                    }
                    written += 1;
                }
                Ok(event) => {
                    tracing::debug!(
                        event_type = %event.event_type,
                        vehicle_id = ?event.vehicle_id,
                        "Ignoring non-recommendation event",
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Recommendation sink lagged, some recommendations were not written");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(written, "Event bus closed, recommendation sink shutting down");
                    break;
                }
            }
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!(error = %e, "Failed to flush recommendation sink");
        }
        written
    }

    async fn write_line<W>(writer: &mut W, payload: &serde_json::Value) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = serde_json::to_vec(payload).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await
    }

    fn log_recommendation(event: &FleetEvent) {
        let action_required = event.payload["action_required"].as_bool().unwrap_or(false);
        let priority = event.payload["priority"].as_str().unwrap_or("unknown");
        if action_required {
            tracing::info!(
                vehicle_id = ?event.vehicle_id,
                priority,
                "Maintenance action required",
            );
        } else {
            tracing::debug!(vehicle_id = ?event.vehicle_id, priority, "Recommendation emitted");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
