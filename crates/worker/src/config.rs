use std::str::FromStr;

use fleethealth_core::anomaly::AnomalyConfig;
use fleethealth_core::rul::RulConfig;
use fleethealth_core::vehicle::EngineConfig;
use fleethealth_core::window::DEFAULT_WINDOW_CAPACITY;

/// Default per-vehicle snapshot queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default time each worker gets to exit on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Worker and engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bounded snapshot queue per vehicle (default: `32`).
    pub queue_capacity: usize,
    /// Seconds to wait for each worker on shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// Engine tunables shared by every vehicle.
    pub engine: EngineConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            engine: EngineConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `QUEUE_CAPACITY`          | `32`    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `5`     |
    /// | `WINDOW_CAPACITY`         | `128`   |
    /// | `ANOMALY_WINDOW_SIZE`     | `20`    |
    /// | `ANOMALY_SIGMA_THRESHOLD` | `3.0`   |
    /// | `RUL_MIN_SAMPLES`         | `10`    |
    /// | `SAMPLE_INTERVAL_SECS`    | `3600`  |
    /// | `SOH_FAILURE_THRESHOLD`   | `80.0`  |
    ///
    /// Panics on unparsable values; misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let defaults = AnomalyConfig::default();
        let anomaly = AnomalyConfig {
            window_size: env_or("ANOMALY_WINDOW_SIZE", defaults.window_size),
            sigma_threshold: env_or("ANOMALY_SIGMA_THRESHOLD", defaults.sigma_threshold),
        };

        let soh = RulConfig::battery_soh();
        let soh = RulConfig {
            threshold: env_or("SOH_FAILURE_THRESHOLD", soh.threshold),
            min_samples: env_or("RUL_MIN_SAMPLES", soh.min_samples),
            sample_interval_secs: env_or("SAMPLE_INTERVAL_SECS", soh.sample_interval_secs),
            ..soh
        };

        let engine = EngineConfig {
            window_capacity: env_or("WINDOW_CAPACITY", DEFAULT_WINDOW_CAPACITY),
            anomaly,
            rul_targets: vec![soh],
            ..EngineConfig::default()
        };

        Self {
            queue_capacity: env_or("QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            engine,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.shutdown_timeout_secs, 5);
        assert_eq!(config.engine.window_capacity, 128);
        assert_eq!(config.engine.anomaly.window_size, 20);
        assert_eq!(config.engine.rul_targets[0].threshold, 80.0);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        assert_eq!(env_or("FLEETHEALTH_TEST_UNSET_VARIABLE", 7usize), 7);
    }
}
