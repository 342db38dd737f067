//! Forecaster capability used by the vehicle engine for RUL estimates.
//!
//! [`LinearExtrapolator`] is always available. [`ExternalForecaster`] wraps an
//! optional, swappable backend (for example a long-horizon forecasting
//! service) and falls back to linear extrapolation whenever the backend is
//! absent or fails. [`SeasonalTrendForecaster`] is the built-in stand-in
//! backend: trend plus a damped daily seasonal component.

use std::sync::Arc;

use crate::rul::{self, fit_line, RulConfig, RulMethod, RulPrediction};
use crate::window::MetricSample;

/// Default projection horizon, in samples (one week at hourly cadence).
pub const DEFAULT_HORIZON: usize = 168;

/// Default season length, in samples (one day at hourly cadence).
pub const DEFAULT_SEASON_LENGTH: usize = 24;

/// Weight of the seasonal component in the projection.
const SEASONAL_DAMPING: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error("Forecast backend unavailable: {0}")]
    Unavailable(String),

    #[error("Forecast failed: {0}")]
    Failed(String),
}

/// Produces an RUL estimate from a metric's sample history.
pub trait Forecaster: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn predict(
        &self,
        samples: &[MetricSample],
        config: &RulConfig,
    ) -> Result<RulPrediction, ForecastError>;
}

// ---------------------------------------------------------------------------
// LinearExtrapolator
// ---------------------------------------------------------------------------

/// Least-squares extrapolation (see [`crate::rul::predict`]). Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearExtrapolator;

impl Forecaster for LinearExtrapolator {
    fn name(&self) -> &'static str {
        "linear_extrapolator"
    }

    fn predict(
        &self,
        samples: &[MetricSample],
        config: &RulConfig,
    ) -> Result<RulPrediction, ForecastError> {
        Ok(rul::predict(samples, config))
    }
}

// ---------------------------------------------------------------------------
// SeasonalTrendForecaster
// ---------------------------------------------------------------------------

/// Projects `last + slope * (i + 1) + 0.3 * seasonal deviation` forward and
/// reports the first step that reaches the threshold.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalTrendForecaster {
    pub horizon: usize,
    pub season_length: usize,
}

impl Default for SeasonalTrendForecaster {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            season_length: DEFAULT_SEASON_LENGTH,
        }
    }
}

impl Forecaster for SeasonalTrendForecaster {
    fn name(&self) -> &'static str {
        "seasonal_trend"
    }

    fn predict(
        &self,
        samples: &[MetricSample],
        config: &RulConfig,
    ) -> Result<RulPrediction, ForecastError> {
        let current = samples.last().map(|s| s.value);
        if samples.len() < config.min_samples.max(2) {
            return Ok(RulPrediction::insufficient_data(config, current));
        }
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let (Some(fit), Some(current)) = (fit_line(&values), current) else {
            return Ok(RulPrediction::insufficient_data(config, None));
        };

        let season_len = self.season_length.clamp(1, values.len());
        let season = &values[values.len() - season_len..];
        let season_mean = season.iter().sum::<f64>() / season_len as f64;

        let falling = config.threshold < current;
        for step in 0..self.horizon {
            let trend = current + fit.slope * (step + 1) as f64;
            let seasonal = season[step % season_len] - season_mean;
            let projected = trend + SEASONAL_DAMPING * seasonal;
            let crossed = if falling {
                projected <= config.threshold
            } else {
                projected >= config.threshold
            };
            if crossed {
                return Ok(RulPrediction::estimate(
                    config,
                    current,
                    fit.slope,
                    (step + 1) as f64,
                    fit.r_squared,
                    RulMethod::ExternalForecast,
                ));
            }
        }

        Ok(RulPrediction::no_trend(config, current, fit.slope))
    }
}

// ---------------------------------------------------------------------------
// ExternalForecaster
// ---------------------------------------------------------------------------

/// Best-effort forecaster: delegates to `backend` when present, otherwise or
/// on failure uses [`LinearExtrapolator`].
#[derive(Clone, Default)]
pub struct ExternalForecaster {
    backend: Option<Arc<dyn Forecaster>>,
    fallback: LinearExtrapolator,
}

impl ExternalForecaster {
    pub fn new(backend: Option<Arc<dyn Forecaster>>) -> Self {
        Self {
            backend,
            fallback: LinearExtrapolator,
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }
}

impl std::fmt::Debug for ExternalForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalForecaster")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Forecaster for ExternalForecaster {
    fn name(&self) -> &'static str {
        "external"
    }

    fn predict(
        &self,
        samples: &[MetricSample],
        config: &RulConfig,
    ) -> Result<RulPrediction, ForecastError> {
        if let Some(backend) = &self.backend {
            match backend.predict(samples, config) {
                Ok(prediction) => return Ok(prediction),
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        metric = %config.metric,
                        error = %e,
                        "Forecast backend failed, falling back to linear extrapolation",
                    );
                }
            }
        }
        self.fallback.predict(samples, config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::metric_names::Metric;

    fn samples(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(start + Duration::hours(i as i64), *v))
            .collect()
    }

    struct FailingBackend;

    impl Forecaster for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn predict(&self, _: &[MetricSample], _: &RulConfig) -> Result<RulPrediction, ForecastError> {
            Err(ForecastError::Unavailable("no api key".to_string()))
        }
    }

    #[test]
    fn external_without_backend_matches_linear() {
        let values: Vec<f64> = (0..30).map(|i| 95.0 - 0.5 * i as f64).collect();
        let config = RulConfig::battery_soh();
        let external = ExternalForecaster::new(None)
            .predict(&samples(&values), &config)
            .unwrap();
        let linear = rul::predict(&samples(&values), &config);
        assert!(!ExternalForecaster::default().has_backend());
        assert_eq!(external, linear);
    }

    #[test]
    fn failing_backend_falls_back_to_linear() {
        let values: Vec<f64> = (0..30).map(|i| 95.0 - 0.5 * i as f64).collect();
        let forecaster = ExternalForecaster::new(Some(Arc::new(FailingBackend)));
        let prediction = forecaster
            .predict(&samples(&values), &RulConfig::battery_soh())
            .unwrap();
        assert_eq!(prediction.method, RulMethod::LinearRegression);
    }

    #[test]
    fn seasonal_backend_is_used_when_present() {
        let values: Vec<f64> = (0..48).map(|i| 95.0 - 0.25 * i as f64).collect();
        let forecaster = ExternalForecaster::new(Some(Arc::new(SeasonalTrendForecaster::default())));
        let prediction = forecaster
            .predict(&samples(&values), &RulConfig::battery_soh())
            .unwrap();
        assert_eq!(prediction.method, RulMethod::ExternalForecast);
        // 83.25 with slope -0.25 plus the damped seasonal deviation of the
        // last day projects 83.8625 - 0.325 * step, first <= 80 at step 12.
        assert_eq!(prediction.rul_samples, Some(13.0));
    }

    #[test]
    fn seasonal_forecast_without_crossing_in_horizon() {
        let values: Vec<f64> = (0..48).map(|i| 95.0 - 0.01 * i as f64).collect();
        let forecaster = SeasonalTrendForecaster {
            horizon: 24,
            ..SeasonalTrendForecaster::default()
        };
        let prediction = forecaster
            .predict(&samples(&values), &RulConfig::battery_soh())
            .unwrap();
        assert_eq!(prediction.method, RulMethod::NoDegradationTrend);
    }

    #[test]
    fn seasonal_forecast_needs_min_samples() {
        let prediction = SeasonalTrendForecaster::default()
            .predict(&samples(&[90.0; 5]), &RulConfig::new(Metric::BatterySoh, 80.0))
            .unwrap();
        assert_eq!(prediction.method, RulMethod::InsufficientData);
    }
}
