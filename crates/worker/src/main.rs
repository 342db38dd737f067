//! Replay driver: reads bridge snapshots as JSON lines on stdin and writes
//! every maintenance recommendation as a JSON line on stdout.

use std::sync::Arc;
use std::time::Duration;

use fleethealth_core::snapshot::TelemetrySnapshot;
use fleethealth_events::{EventBus, RecommendationSink};
use fleethealth_worker::{Fleet, FleetError, WorkerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries recommendations.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleethealth_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(queue_capacity = config.queue_capacity, "Loaded worker configuration");

    let event_bus = Arc::new(EventBus::default());
    let sink_handle = tokio::spawn(RecommendationSink::run(
        tokio::io::stdout(),
        event_bus.subscribe(),
    ));

    let fleet = Fleet::new(config, Arc::clone(&event_bus)).expect("Invalid worker configuration");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0u64;
    let mut skipped = 0u64;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match replay_line(&fleet, &line).await {
            Ok(()) => submitted += 1,
            Err(e) => {
                skipped += 1;
                tracing::warn!(error = %e, "Skipping input line");
            }
        }
    }
    tracing::info!(submitted, skipped, "Input exhausted, flushing fleet");

    if let Err(e) = fleet.flush().await {
        tracing::error!(error = %e, "Failed to flush fleet");
    }
    for summary in fleet.list().await {
        tracing::info!(
            vehicle_id = %summary.vehicle_id,
            priority = ?summary.latest_priority,
            health_score = ?summary.latest_health_score,
            "Final vehicle state",
        );
    }
    fleet.shutdown().await;

    // Dropping the last bus references closes the channel and stops the sink.
    drop(fleet);
    drop(event_bus);
    match tokio::time::timeout(Duration::from_secs(5), sink_handle).await {
        Ok(Ok(written)) => tracing::info!(written, "Replay complete"),
        Ok(Err(e)) => tracing::error!(error = %e, "Recommendation sink panicked"),
        Err(_) => tracing::warn!("Recommendation sink did not stop in time"),
    }
}

async fn replay_line(fleet: &Fleet, line: &str) -> Result<(), ReplayError> {
    let raw: serde_json::Value = serde_json::from_str(line)?;
    let parsed = TelemetrySnapshot::from_json(&raw).map_err(FleetError::from)?;
    if !parsed.dropped_fields.is_empty() {
        tracing::debug!(
            vehicle_id = %parsed.snapshot.vehicle_id,
            dropped = ?parsed.dropped_fields,
            "Dropped non-metric snapshot fields",
        );
    }
    fleet.submit_wait(parsed.snapshot).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fleet(#[from] FleetError),
}
