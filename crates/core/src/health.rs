//! Rule-based composite health score (0-100).
//!
//! Each rule watches one metric and deducts points proportional to how far
//! the reading sits beyond its boundary, capped per rule. Rules are
//! independent and their deductions add up. A metric missing from the
//! snapshot deducts nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric_names::Metric;

/// Score of a vehicle with no deductions.
pub const MAX_HEALTH_SCORE: f64 = 100.0;

/// Which side of the boundary counts as a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// One row of the deduction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionRule {
    pub metric: Metric,
    pub direction: Direction,
    pub boundary: f64,
    pub max_deduction: f64,
    pub per_unit_penalty: f64,
}

impl DeductionRule {
    pub const fn new(
        metric: Metric,
        direction: Direction,
        boundary: f64,
        max_deduction: f64,
        per_unit_penalty: f64,
    ) -> Self {
        Self {
            metric,
            direction,
            boundary,
            max_deduction,
            per_unit_penalty,
        }
    }

    /// Distance past the boundary, or `None` when the value is safe.
    ///
    /// A value sitting exactly on the boundary is safe.
    fn violation(&self, value: f64) -> Option<f64> {
        let excess = match self.direction {
            Direction::Above => value - self.boundary,
            Direction::Below => self.boundary - value,
        };
        (excess > 0.0).then_some(excess)
    }

    /// Capped deduction for `value`, zero when within bounds.
    pub fn deduction_for(&self, value: f64) -> f64 {
        self.violation(value)
            .map(|excess| (self.per_unit_penalty * excess).min(self.max_deduction))
            .unwrap_or(0.0)
    }
}

/// A single applied deduction, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub rule_name: String,
    pub amount: f64,
    pub reason: String,
}

/// Result of one scoring pass. A fresh value is produced every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub value: f64,
    pub deductions: Vec<Deduction>,
}

/// Ordered deduction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRules {
    rules: Vec<DeductionRule>,
}

impl Default for HealthRules {
    fn default() -> Self {
        Self {
            rules: vec![
                DeductionRule::new(Metric::EngineCoolantTemp, Direction::Above, 95.0, 20.0, 2.0),
                DeductionRule::new(Metric::EngineOilPressure, Direction::Below, 3.5, 15.0, 10.0),
                DeductionRule::new(Metric::BatterySoh, Direction::Below, 80.0, 25.0, 1.5),
                DeductionRule::new(Metric::BatteryTempMax, Direction::Above, 45.0, 15.0, 1.5),
                DeductionRule::new(Metric::HydraulicPressure, Direction::Below, 150.0, 20.0, 0.5),
                DeductionRule::new(Metric::SensorQualityScore, Direction::Below, 90.0, 10.0, 0.5),
            ],
        }
    }
}

impl HealthRules {
    /// Build a custom table.
    ///
    /// Boundaries must be finite; caps and penalties must be finite and
    /// positive.
    pub fn new(rules: Vec<DeductionRule>) -> Result<Self, CoreError> {
        for rule in &rules {
            if !rule.boundary.is_finite() {
                return Err(CoreError::Validation(format!(
                    "Rule for {} has a non-finite boundary",
                    rule.metric
                )));
            }
            if !(rule.max_deduction.is_finite() && rule.max_deduction > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Rule for {} must have a positive max_deduction",
                    rule.metric
                )));
            }
            if !(rule.per_unit_penalty.is_finite() && rule.per_unit_penalty > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Rule for {} must have a positive per_unit_penalty",
                    rule.metric
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[DeductionRule] {
        &self.rules
    }

    /// Metrics referenced by at least one rule, in table order.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut out: Vec<Metric> = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !out.contains(&rule.metric) {
                out.push(rule.metric);
            }
        }
        out
    }

    /// Score a flat snapshot of metric readings.
    pub fn score(&self, snapshot: &BTreeMap<Metric, f64>) -> HealthScore {
        let mut deductions = Vec::new();
        let mut total = 0.0;

        for rule in &self.rules {
            let Some(&value) = snapshot.get(&rule.metric) else {
                continue;
            };
            let amount = rule.deduction_for(value);
            if amount <= 0.0 {
                continue;
            }
            total += amount;
            let side = match rule.direction {
                Direction::Above => "above",
                Direction::Below => "below",
            };
            deductions.push(Deduction {
                rule_name: rule.metric.to_string(),
                amount,
                reason: format!(
                    "{} = {value:.2} is {side} boundary {:.2}",
                    rule.metric, rule.boundary
                ),
            });
        }

        HealthScore {
            value: (MAX_HEALTH_SCORE - total).clamp(0.0, MAX_HEALTH_SCORE),
            deductions,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(Metric, f64)]) -> BTreeMap<Metric, f64> {
        pairs.iter().copied().collect()
    }

    fn safe_snapshot() -> BTreeMap<Metric, f64> {
        snapshot(&[
            (Metric::EngineCoolantTemp, 85.0),
            (Metric::EngineOilPressure, 4.5),
            (Metric::BatterySoh, 95.0),
            (Metric::BatteryTempMax, 35.0),
            (Metric::HydraulicPressure, 180.0),
            (Metric::SensorQualityScore, 96.0),
        ])
    }

    #[test]
    fn all_safe_metrics_score_exactly_100() {
        let score = HealthRules::default().score(&safe_snapshot());
        assert_eq!(score.value, 100.0);
        assert!(score.deductions.is_empty());
    }

    #[test]
    fn values_on_the_boundary_are_safe() {
        let rules = HealthRules::default();
        let score = rules.score(&snapshot(&[
            (Metric::EngineCoolantTemp, 95.0),
            (Metric::EngineOilPressure, 3.5),
            (Metric::BatterySoh, 80.0),
        ]));
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn empty_snapshot_is_not_penalised() {
        let score = HealthRules::default().score(&BTreeMap::new());
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn untracked_metrics_are_ignored() {
        let score = HealthRules::default().score(&snapshot(&[(Metric::FuelLevel, 1.0)]));
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn coolant_deduction_around_the_cap() {
        let rules = HealthRules::default();
        // Cap activates at 10 degrees over (2.0 * 10 = 20).
        let below = rules.score(&snapshot(&[(Metric::EngineCoolantTemp, 104.0)]));
        assert_eq!(below.value, 82.0);

        let at = rules.score(&snapshot(&[(Metric::EngineCoolantTemp, 105.0)]));
        assert_eq!(at.value, 80.0);

        let above = rules.score(&snapshot(&[(Metric::EngineCoolantTemp, 106.0)]));
        assert_eq!(above.value, 80.0);
        assert_eq!(above.deductions[0].amount, 20.0);
    }

    #[test]
    fn soh_deduction_around_the_cap() {
        let rules = HealthRules::default();
        let rule = &rules.rules()[2];
        assert_eq!(rule.metric, Metric::BatterySoh);
        // 25 / 1.5 = 16.67 points under the boundary.
        assert!((rule.deduction_for(70.0) - 15.0).abs() < 1e-9);
        assert!((rule.deduction_for(80.0 - 25.0 / 1.5) - 25.0).abs() < 1e-9);
        assert_eq!(rule.deduction_for(50.0), 25.0);
    }

    #[test]
    fn deductions_are_additive_and_ordered() {
        let mut snap = safe_snapshot();
        snap.insert(Metric::EngineCoolantTemp, 112.0);
        snap.insert(Metric::HydraulicPressure, 140.0);
        let score = HealthRules::default().score(&snap);

        assert_eq!(score.value, 100.0 - 20.0 - 5.0);
        let names: Vec<_> = score.deductions.iter().map(|d| d.rule_name.as_str()).collect();
        assert_eq!(names, vec!["engine_coolant_temp", "hydraulic_pressure"]);
    }

    #[test]
    fn score_floors_at_zero() {
        let rules = HealthRules::new(vec![
            DeductionRule::new(Metric::EngineCoolantTemp, Direction::Above, 95.0, 80.0, 10.0),
            DeductionRule::new(Metric::BatterySoh, Direction::Below, 80.0, 80.0, 10.0),
        ])
        .unwrap();
        let score = rules.score(&snapshot(&[
            (Metric::EngineCoolantTemp, 200.0),
            (Metric::BatterySoh, 10.0),
        ]));
        assert_eq!(score.value, 0.0);
        assert_eq!(score.deductions.len(), 2);
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let bad = HealthRules::new(vec![DeductionRule::new(
            Metric::BatterySoh,
            Direction::Below,
            80.0,
            -1.0,
            1.0,
        )]);
        assert!(bad.is_err());

        let nan = HealthRules::new(vec![DeductionRule::new(
            Metric::BatterySoh,
            Direction::Below,
            f64::NAN,
            10.0,
            1.0,
        )]);
        assert!(nan.is_err());
    }

    #[test]
    fn rule_metrics_follow_table_order() {
        assert_eq!(
            HealthRules::default().metrics(),
            vec![
                Metric::EngineCoolantTemp,
                Metric::EngineOilPressure,
                Metric::BatterySoh,
                Metric::BatteryTempMax,
                Metric::HydraulicPressure,
                Metric::SensorQualityScore,
            ]
        );
    }
}
