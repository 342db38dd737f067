//! Remaining-useful-life estimation by linear extrapolation.
//!
//! Fits `value = slope * index + intercept` over the sample index (not the
//! timestamp; samples are assumed to arrive on the caller's sampling cadence)
//! and extrapolates from the newest value to the failure threshold.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric_names::Metric;
use crate::window::MetricSample;

/// Minimum samples before a fit is attempted.
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Default sampling cadence: one sample per hour.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 3600;

/// Default battery state-of-health failure threshold (percent).
pub const DEFAULT_SOH_FAILURE_THRESHOLD: f64 = 80.0;

const SECS_PER_HOUR: f64 = 3600.0;
const HOURS_PER_DAY: f64 = 24.0;

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulMethod {
    LinearRegression,
    InsufficientData,
    NoDegradationTrend,
    /// Produced by a pluggable forecaster backend.
    ExternalForecast,
}

impl RulMethod {
    /// Whether the prediction carries a usable time estimate.
    pub fn has_estimate(self) -> bool {
        matches!(self, RulMethod::LinearRegression | RulMethod::ExternalForecast)
    }
}

/// Which indicator to extrapolate and where it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulConfig {
    pub metric: Metric,
    pub threshold: f64,
    pub min_samples: usize,
    pub sample_interval_secs: u64,
}

impl RulConfig {
    pub fn new(metric: Metric, threshold: f64) -> Self {
        Self {
            metric,
            threshold,
            min_samples: DEFAULT_MIN_SAMPLES,
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
        }
    }

    /// Battery SOH degrading towards 80 %.
    pub fn battery_soh() -> Self {
        Self::new(Metric::BatterySoh, DEFAULT_SOH_FAILURE_THRESHOLD)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.threshold.is_finite() {
            return Err(CoreError::Validation(format!(
                "RUL threshold for {} must be finite",
                self.metric
            )));
        }
        if self.min_samples < 2 {
            return Err(CoreError::Validation(
                "RUL min_samples must be at least 2".to_string(),
            ));
        }
        if self.sample_interval_secs == 0 {
            return Err(CoreError::Validation(
                "RUL sample_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert a step count into hours on this cadence.
    pub fn steps_to_hours(&self, steps: f64) -> f64 {
        steps * self.sample_interval_secs as f64 / SECS_PER_HOUR
    }
}

/// Outcome of an RUL estimate. A fresh value per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulPrediction {
    pub metric_name: Metric,
    pub current_value: Option<f64>,
    pub threshold: f64,
    /// Fitted slope, in metric units per sample.
    pub degradation_rate: Option<f64>,
    pub rul_samples: Option<f64>,
    pub rul_hours: Option<f64>,
    /// Time to threshold in days.
    pub rul_time_estimate: Option<f64>,
    /// R² of the fit in `[0, 1]`; zero when no estimate was made.
    pub confidence: f64,
    pub method: RulMethod,
}

impl RulPrediction {
    pub fn insufficient_data(config: &RulConfig, current_value: Option<f64>) -> Self {
        Self {
            metric_name: config.metric,
            current_value,
            threshold: config.threshold,
            degradation_rate: None,
            rul_samples: None,
            rul_hours: None,
            rul_time_estimate: None,
            confidence: 0.0,
            method: RulMethod::InsufficientData,
        }
    }

    pub fn no_trend(config: &RulConfig, current_value: f64, slope: f64) -> Self {
        Self {
            metric_name: config.metric,
            current_value: Some(current_value),
            threshold: config.threshold,
            degradation_rate: Some(slope),
            rul_samples: None,
            rul_hours: None,
            rul_time_estimate: None,
            confidence: 0.0,
            method: RulMethod::NoDegradationTrend,
        }
    }

    /// Build an estimate from a step count on the configured cadence.
    pub fn estimate(
        config: &RulConfig,
        current_value: f64,
        slope: f64,
        steps: f64,
        confidence: f64,
        method: RulMethod,
    ) -> Self {
        let hours = config.steps_to_hours(steps);
        Self {
            metric_name: config.metric,
            current_value: Some(current_value),
            threshold: config.threshold,
            degradation_rate: Some(slope),
            rul_samples: Some(steps),
            rul_hours: Some(hours),
            rul_time_estimate: Some(hours / HOURS_PER_DAY),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }
}

/// Ordinary least-squares line over `0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; zero when the series has no variance.
    pub r_squared: f64,
}

/// Fit a line over the sample index. `None` for fewer than two values.
pub fn fit_line(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        ss_xy += dx * (y - y_mean);
        ss_xx += dx * dx;
    }
    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        let ss_res: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2))
            .sum();
        1.0 - ss_res / ss_tot
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Predict when the indicator described by `config` crosses its threshold.
pub fn predict(samples: &[MetricSample], config: &RulConfig) -> RulPrediction {
    let current = samples.last().map(|s| s.value);
    if samples.len() < config.min_samples.max(2) {
        return RulPrediction::insufficient_data(config, current);
    }
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let (Some(fit), Some(current)) = (fit_line(&values), current) else {
        return RulPrediction::insufficient_data(config, None);
    };

    let gap = config.threshold - current;
    if fit.slope == 0.0 || gap.signum() != fit.slope.signum() {
        return RulPrediction::no_trend(config, current, fit.slope);
    }

    let steps = gap / fit.slope;
    if !steps.is_finite() || steps <= 0.0 {
        return RulPrediction::no_trend(config, current, fit.slope);
    }

    RulPrediction::estimate(
        config,
        current,
        fit.slope,
        steps,
        fit.r_squared,
        RulMethod::LinearRegression,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn samples(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(start + Duration::hours(i as i64), *v))
            .collect()
    }

    /// 30 equally spaced values from 100 down to 70.
    fn linear_decline() -> Vec<f64> {
        (0..30).map(|i| 100.0 - 30.0 * i as f64 / 29.0).collect()
    }

    #[test]
    fn fit_recovers_exact_line() {
        let fit = fit_line(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn flat_series_has_zero_r_squared() {
        let fit = fit_line(&[5.0; 12]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 0.0);
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let prediction = predict(&samples(&[90.0; 9]), &RulConfig::battery_soh());
        assert_eq!(prediction.method, RulMethod::InsufficientData);
        assert_eq!(prediction.confidence, 0.0);
        assert!(prediction.rul_time_estimate.is_none());
        assert_eq!(prediction.current_value, Some(90.0));
    }

    #[test]
    fn linear_decline_crossing_is_exact() {
        let config = RulConfig::new(Metric::BatterySoh, 60.0);
        let prediction = predict(&samples(&linear_decline()), &config);

        assert_eq!(prediction.method, RulMethod::LinearRegression);
        assert!((prediction.confidence - 1.0).abs() < 1e-9);

        // The line reaches 60 at index 40 * 29 / 30; the newest sample is index 29.
        let expected_steps = 40.0 * 29.0 / 30.0 - 29.0;
        let steps = prediction.rul_samples.unwrap();
        assert!((steps - expected_steps).abs() < 1e-9, "steps = {steps}");
        assert!((prediction.rul_hours.unwrap() - expected_steps).abs() < 1e-9);
        assert!((prediction.rul_time_estimate.unwrap() - expected_steps / 24.0).abs() < 1e-9);
        assert!((prediction.degradation_rate.unwrap() + 30.0 / 29.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_already_behind_the_series_is_not_a_trend() {
        // The decline passed 80 at index ~19.3; the newest value (70) is beyond it.
        let prediction = predict(&samples(&linear_decline()), &RulConfig::battery_soh());
        assert_eq!(prediction.method, RulMethod::NoDegradationTrend);
        assert!(prediction.rul_time_estimate.is_none());
        assert_eq!(prediction.confidence, 0.0);
    }

    #[test]
    fn improving_series_is_not_a_trend() {
        let rising: Vec<f64> = (0..20).map(|i| 85.0 + i as f64 * 0.1).collect();
        let prediction = predict(&samples(&rising), &RulConfig::battery_soh());
        assert_eq!(prediction.method, RulMethod::NoDegradationTrend);
    }

    #[test]
    fn flat_series_is_not_a_trend() {
        let prediction = predict(&samples(&[95.0; 25]), &RulConfig::battery_soh());
        assert_eq!(prediction.method, RulMethod::NoDegradationTrend);
        assert_eq!(prediction.degradation_rate, Some(0.0));
    }

    #[test]
    fn rising_indicator_towards_upper_threshold() {
        // Coolant climbing 1 degree per sample towards 110.
        let climbing: Vec<f64> = (0..15).map(|i| 90.0 + i as f64).collect();
        let config = RulConfig::new(Metric::EngineCoolantTemp, 110.0);
        let prediction = predict(&samples(&climbing), &config);
        assert_eq!(prediction.method, RulMethod::LinearRegression);
        assert!((prediction.rul_samples.unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn sample_interval_scales_the_time_estimate() {
        let config = RulConfig {
            sample_interval_secs: 6 * 3600,
            ..RulConfig::new(Metric::BatterySoh, 60.0)
        };
        let prediction = predict(&samples(&linear_decline()), &config);
        let steps = prediction.rul_samples.unwrap();
        assert!((prediction.rul_hours.unwrap() - steps * 6.0).abs() < 1e-9);
        assert!((prediction.rul_time_estimate.unwrap() - steps / 4.0).abs() < 1e-9);
    }

    #[test]
    fn noisy_decline_has_partial_confidence() {
        let noisy: Vec<f64> = (0..20)
            .map(|i| 95.0 - 0.2 * i as f64 + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect();
        let prediction = predict(&samples(&noisy), &RulConfig::battery_soh());
        assert_eq!(prediction.method, RulMethod::LinearRegression);
        assert!(prediction.confidence > 0.0 && prediction.confidence < 0.9);
    }

    #[test]
    fn config_validation() {
        assert!(RulConfig::battery_soh().validate().is_ok());
        let zero_interval = RulConfig {
            sample_interval_secs: 0,
            ..RulConfig::battery_soh()
        };
        assert!(zero_interval.validate().is_err());
        let nan = RulConfig::new(Metric::BatterySoh, f64::NAN);
        assert!(nan.validate().is_err());
    }
}
