//! Rolling z-score anomaly detection for the newest sample in a window.
//!
//! The reference population is the run of samples immediately before the
//! newest one; the newest sample is scored against it and never contributes
//! to its own baseline.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric_names::Metric;
use crate::types::Timestamp;
use crate::window::MetricWindow;

/// Default number of reference samples.
pub const DEFAULT_ANOMALY_WINDOW: usize = 20;

/// Default z-score above which a sample is anomalous (3-sigma rule).
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 3.0;

/// z-score at which confidence saturates to 1.0.
const CONFIDENCE_FULL_Z: f64 = 5.0;

/// Smallest reference population that yields a meaningful sample std.
const MIN_WINDOW_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    pub window_size: usize,
    pub sigma_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_ANOMALY_WINDOW,
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(CoreError::Validation(format!(
                "Anomaly window_size must be at least {MIN_WINDOW_SIZE}"
            )));
        }
        if !self.sigma_threshold.is_finite() || self.sigma_threshold <= 0.0 {
            return Err(CoreError::Validation(
                "Anomaly sigma_threshold must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Verdict for the newest sample of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub metric_name: Metric,
    pub timestamp: Option<Timestamp>,
    pub is_anomaly: bool,
    pub z_score: f64,
    /// `min(1, z / 5)`; zero when there was not enough data.
    pub confidence: f64,
}

impl AnomalyResult {
    fn quiet(metric: Metric, timestamp: Option<Timestamp>) -> Self {
        Self {
            metric_name: metric,
            timestamp,
            is_anomaly: false,
            z_score: 0.0,
            confidence: 0.0,
        }
    }
}

/// Score the newest sample of `window` against the samples preceding it.
///
/// Returns a non-anomalous result with zero confidence when the window holds
/// fewer than `config.window_size` samples or the reference has no spread.
pub fn detect(window: &MetricWindow, config: &AnomalyConfig) -> AnomalyResult {
    let metric = window.metric();
    let latest = window.latest().copied();
    let timestamp = latest.map(|s| s.timestamp);

    let latest = match latest {
        Some(sample) if window.len() >= config.window_size => sample,
        _ => return AnomalyResult::quiet(metric, timestamp),
    };

    let values = window.values();
    let end = values.len() - 1;
    let start = end.saturating_sub(config.window_size);
    let reference = &values[start..end];

    let (mean, std) = match mean_and_std(reference) {
        Some(stats) => stats,
        None => return AnomalyResult::quiet(metric, timestamp),
    };

    if std == 0.0 {
        return AnomalyResult::quiet(metric, timestamp);
    }

    let z_score = (latest.value - mean).abs() / std;
    AnomalyResult {
        metric_name: metric,
        timestamp,
        is_anomaly: z_score > config.sigma_threshold,
        z_score,
        confidence: (z_score / CONFIDENCE_FULL_Z).min(1.0),
    }
}

/// Mean and sample standard deviation (n - 1 denominator).
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((mean, (ss / (n - 1.0)).sqrt()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::window::MetricSample;

    /// Twenty values with mean exactly 50 and sample std exactly 2:
    /// seven deviations of +/-3 and thirteen of +/-1 (sum of squares 76).
    const STABLE: [f64; 20] = [
        53.0, 53.0, 53.0, 53.0, 47.0, 47.0, 47.0, 51.0, 51.0, 51.0, 51.0, 51.0, 49.0, 49.0, 49.0,
        49.0, 49.0, 49.0, 49.0, 49.0,
    ];

    fn window_of(values: &[f64]) -> MetricWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut window = MetricWindow::new(Metric::EngineCoolantTemp, 64);
        for (i, v) in values.iter().enumerate() {
            window
                .append(MetricSample::new(start + Duration::hours(i as i64), *v))
                .unwrap();
        }
        window
    }

    fn with_latest(latest: f64) -> MetricWindow {
        let mut values = STABLE.to_vec();
        values.push(latest);
        window_of(&values)
    }

    #[test]
    fn stable_fixture_has_exact_moments() {
        let (mean, std) = mean_and_std(&STABLE).unwrap();
        assert_eq!(mean, 50.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn just_above_three_sigma_is_anomalous() {
        let result = detect(&with_latest(50.0 + 3.01 * 2.0), &AnomalyConfig::default());
        assert!(result.is_anomaly);
        assert!((result.z_score - 3.01).abs() < 1e-9);
        assert!((result.confidence - 3.01 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn exactly_three_sigma_is_not_anomalous() {
        let result = detect(&with_latest(56.0), &AnomalyConfig::default());
        assert_eq!(result.z_score, 3.0);
        assert!(!result.is_anomaly);
    }

    #[test]
    fn negative_excursion_is_detected() {
        let result = detect(&with_latest(40.0), &AnomalyConfig::default());
        assert!(result.is_anomaly);
        assert_eq!(result.z_score, 5.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn confidence_saturates_at_one() {
        let result = detect(&with_latest(100.0), &AnomalyConfig::default());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn insufficient_data_is_quiet() {
        let window = window_of(&STABLE[..10]);
        let result = detect(&window, &AnomalyConfig::default());
        assert!(!result.is_anomaly);
        assert_eq!(result.confidence, 0.0);
        assert!(result.timestamp.is_some());
    }

    #[test]
    fn empty_window_is_quiet() {
        let window = MetricWindow::new(Metric::BatterySoh, 8);
        let result = detect(&window, &AnomalyConfig::default());
        assert!(!result.is_anomaly);
        assert!(result.timestamp.is_none());
    }

    #[test]
    fn zero_variance_reference_is_not_anomalous() {
        let mut values = vec![85.0; 24];
        values.push(112.0);
        let result = detect(&window_of(&values), &AnomalyConfig::default());
        assert!(!result.is_anomaly);
        assert_eq!(result.z_score, 0.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn only_recent_samples_form_the_reference() {
        // A large early outlier falls outside the 20-sample reference.
        let mut values = vec![500.0];
        values.extend_from_slice(&STABLE);
        values.push(56.02);
        let result = detect(&window_of(&values), &AnomalyConfig::default());
        assert!(result.is_anomaly);
    }

    #[test]
    fn config_validation() {
        assert!(AnomalyConfig::default().validate().is_ok());
        let small = AnomalyConfig {
            window_size: 2,
            ..AnomalyConfig::default()
        };
        assert!(small.validate().is_err());
        let nan = AnomalyConfig {
            sigma_threshold: f64::NAN,
            ..AnomalyConfig::default()
        };
        assert!(nan.validate().is_err());
    }
}
