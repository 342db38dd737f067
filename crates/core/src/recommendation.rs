//! Merge of health, anomaly and RUL signals into one maintenance decision.
//!
//! Each signal is turned into an [`Escalation`] independently; escalations
//! are then folded with a max over [`Priority`], which is commutative and
//! associative, so the order signals are evaluated in cannot change the
//! outcome. Items are emitted in a fixed order by signal source.

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyResult;
use crate::health::HealthScore;
use crate::metric_names::Metric;
use crate::rul::RulPrediction;
use crate::types::{Timestamp, VehicleId};

/// Health below this is critical.
pub const HEALTH_CRITICAL_BELOW: f64 = 60.0;
/// Health below this is high priority.
pub const HEALTH_HIGH_BELOW: f64 = 75.0;
/// Health below this warrants preventive maintenance.
pub const HEALTH_MEDIUM_BELOW: f64 = 85.0;

/// RUL (days) below this is critical.
pub const RUL_CRITICAL_BELOW_DAYS: f64 = 3.0;
/// RUL (days) below this is high priority.
pub const RUL_HIGH_BELOW_DAYS: f64 = 7.0;
/// RUL (days) below this warrants ordering parts.
pub const RUL_MEDIUM_BELOW_DAYS: f64 = 30.0;

/// Ordinal severity. The derived `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    ImmediateInspection,
    ScheduledMaintenance,
    PreventiveMaintenance,
    ComponentReplacement,
    AnomalyInvestigation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub kind: ItemKind,
    pub urgency: Priority,
    pub description: String,
}

/// Where an escalation came from; also fixes the item order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalSource {
    Health,
    Rul,
    Anomaly,
}

/// The outcome of evaluating one signal in isolation.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub source: SignalSource,
    pub priority: Priority,
    pub action_required: bool,
    pub item: RecommendationItem,
}

/// The handoff record for notification and dashboard collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecommendation {
    pub vehicle_id: VehicleId,
    pub timestamp: Timestamp,
    pub health_score: f64,
    pub priority: Priority,
    pub action_required: bool,
    pub items: Vec<RecommendationItem>,
    /// Metrics flagged by the anomaly detector this cycle.
    #[serde(default)]
    pub anomalies: Vec<Metric>,
    /// The prediction the RUL rule was evaluated on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rul_prediction: Option<RulPrediction>,
}

// ---------------------------------------------------------------------------
// Per-signal rules
// ---------------------------------------------------------------------------

pub fn escalate_health(health: &HealthScore) -> Option<Escalation> {
    let score = health.value;
    let (priority, action_required, kind, description) = if score < HEALTH_CRITICAL_BELOW {
        (
            Priority::Critical,
            true,
            ItemKind::ImmediateInspection,
            format!("Health score {score:.1} is critically low; stop the vehicle and inspect immediately"),
        )
    } else if score < HEALTH_HIGH_BELOW {
        (
            Priority::High,
            true,
            ItemKind::ScheduledMaintenance,
            format!("Health score {score:.1} has degraded; schedule maintenance within 24 hours"),
        )
    } else if score < HEALTH_MEDIUM_BELOW {
        (
            Priority::Medium,
            false,
            ItemKind::PreventiveMaintenance,
            format!("Health score {score:.1} is slightly degraded; plan preventive maintenance"),
        )
    } else {
        return None;
    };

    Some(Escalation {
        source: SignalSource::Health,
        priority,
        action_required,
        item: RecommendationItem {
            kind,
            urgency: priority,
            description,
        },
    })
}

pub fn escalate_rul(rul: &RulPrediction) -> Option<Escalation> {
    if !rul.method.has_estimate() {
        return None;
    }
    let days = rul.rul_time_estimate?;
    let (priority, action_required, advice) = if days < RUL_CRITICAL_BELOW_DAYS {
        (Priority::Critical, true, "replace immediately")
    } else if days < RUL_HIGH_BELOW_DAYS {
        (Priority::High, true, "replace as soon as possible")
    } else if days < RUL_MEDIUM_BELOW_DAYS {
        (Priority::Medium, false, "prepare spare parts")
    } else {
        return None;
    };

    Some(Escalation {
        source: SignalSource::Rul,
        priority,
        action_required,
        item: RecommendationItem {
            kind: ItemKind::ComponentReplacement,
            urgency: priority,
            description: format!(
                "{} expected to reach failure threshold {:.1} in {days:.1} days; {advice}",
                rul.metric_name, rul.threshold
            ),
        },
    })
}

pub fn escalate_anomalies(anomalies: &[AnomalyResult]) -> Option<Escalation> {
    let flagged = flagged_metrics(anomalies);
    if flagged.is_empty() {
        return None;
    }
    let names: Vec<&str> = flagged.iter().map(|m| m.as_str()).collect();

    Some(Escalation {
        source: SignalSource::Anomaly,
        priority: Priority::High,
        action_required: true,
        item: RecommendationItem {
            kind: ItemKind::AnomalyInvestigation,
            urgency: Priority::High,
            description: format!(
                "Anomalies detected: {}; inspect in detail",
                names.join(", ")
            ),
        },
    })
}

/// Flagged metrics, sorted and de-duplicated.
fn flagged_metrics(anomalies: &[AnomalyResult]) -> Vec<Metric> {
    let mut flagged: Vec<Metric> = anomalies
        .iter()
        .filter(|a| a.is_anomaly)
        .map(|a| a.metric_name)
        .collect();
    flagged.sort();
    flagged.dedup();
    flagged
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Fold escalations into `(priority, action_required, items)`.
///
/// Starts from `low` / no action and takes the max priority; the result does
/// not depend on the iteration order.
pub fn combine(
    escalations: impl IntoIterator<Item = Escalation>,
) -> (Priority, bool, Vec<RecommendationItem>) {
    let mut escalations: Vec<Escalation> = escalations.into_iter().collect();
    escalations.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.item.kind.cmp(&b.item.kind))
    });

    let priority = escalations
        .iter()
        .map(|e| e.priority)
        .max()
        .unwrap_or_default();
    let action_required = escalations.iter().any(|e| e.action_required);
    let items = escalations.into_iter().map(|e| e.item).collect();
    (priority, action_required, items)
}

/// Build the recommendation for one evaluation cycle.
pub fn merge(
    vehicle_id: &str,
    timestamp: Timestamp,
    health: &HealthScore,
    anomalies: &[AnomalyResult],
    rul: Option<&RulPrediction>,
) -> MaintenanceRecommendation {
    let escalations = [
        escalate_health(health),
        rul.and_then(escalate_rul),
        escalate_anomalies(anomalies),
    ];
    let (priority, action_required, items) = combine(escalations.into_iter().flatten());

    MaintenanceRecommendation {
        vehicle_id: vehicle_id.to_string(),
        timestamp,
        health_score: health.value,
        priority,
        action_required,
        items,
        anomalies: flagged_metrics(anomalies),
        rul_prediction: rul.cloned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::rul::{RulConfig, RulMethod};

    fn health(value: f64) -> HealthScore {
        HealthScore {
            value,
            deductions: Vec::new(),
        }
    }

    fn rul_days(days: f64) -> RulPrediction {
        RulPrediction::estimate(
            &RulConfig::battery_soh(),
            85.0,
            -0.1,
            days * 24.0,
            0.9,
            RulMethod::LinearRegression,
        )
    }

    fn anomaly(metric: Metric, is_anomaly: bool) -> AnomalyResult {
        AnomalyResult {
            metric_name: metric,
            timestamp: None,
            is_anomaly,
            z_score: if is_anomaly { 4.0 } else { 0.5 },
            confidence: if is_anomaly { 0.8 } else { 0.1 },
        }
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn priority_total_order() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Low);
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), "critical");
    }

    #[test]
    fn healthy_vehicle_is_low_without_items() {
        let rec = merge("T1", now(), &health(100.0), &[], None);
        assert_eq!(rec.priority, Priority::Low);
        assert!(!rec.action_required);
        assert!(rec.items.is_empty());
    }

    #[test]
    fn health_bands() {
        let cases = [
            (59.9, Priority::Critical, true, Some(ItemKind::ImmediateInspection)),
            (60.0, Priority::High, true, Some(ItemKind::ScheduledMaintenance)),
            (74.9, Priority::High, true, Some(ItemKind::ScheduledMaintenance)),
            (75.0, Priority::Medium, false, Some(ItemKind::PreventiveMaintenance)),
            (84.9, Priority::Medium, false, Some(ItemKind::PreventiveMaintenance)),
            (85.0, Priority::Low, false, None),
        ];
        for (score, priority, action, kind) in cases {
            let rec = merge("T1", now(), &health(score), &[], None);
            assert_eq!(rec.priority, priority, "score {score}");
            assert_eq!(rec.action_required, action, "score {score}");
            assert_eq!(rec.items.first().map(|i| i.kind), kind, "score {score}");
        }
    }

    #[test]
    fn rul_bands() {
        let cases = [
            (2.5, Priority::Critical, true),
            (3.0, Priority::High, true),
            (6.9, Priority::High, true),
            (7.0, Priority::Medium, false),
            (29.0, Priority::Medium, false),
        ];
        for (days, priority, action) in cases {
            let rul = rul_days(days);
            let rec = merge("T1", now(), &health(100.0), &[], Some(&rul));
            assert_eq!(rec.priority, priority, "days {days}");
            assert_eq!(rec.action_required, action, "days {days}");
            assert_eq!(rec.items[0].kind, ItemKind::ComponentReplacement);
            assert_eq!(rec.items[0].urgency, priority);
        }

        let far = rul_days(45.0);
        let rec = merge("T1", now(), &health(100.0), &[], Some(&far));
        assert_eq!(rec.priority, Priority::Low);
        assert!(rec.items.is_empty());
        assert!(rec.rul_prediction.is_some());
    }

    #[test]
    fn rul_without_estimate_is_no_signal() {
        let rul = RulPrediction::insufficient_data(&RulConfig::battery_soh(), Some(90.0));
        let rec = merge("T1", now(), &health(100.0), &[], Some(&rul));
        assert_eq!(rec.priority, Priority::Low);
        assert!(rec.items.is_empty());
    }

    #[test]
    fn anomaly_raises_to_at_least_high() {
        let anomalies = [
            anomaly(Metric::HydraulicPressure, true),
            anomaly(Metric::BatterySoh, false),
            anomaly(Metric::EngineCoolantTemp, true),
        ];
        let rec = merge("T1", now(), &health(80.0), &anomalies, None);
        assert_eq!(rec.priority, Priority::High);
        assert!(rec.action_required);
        assert_eq!(
            rec.anomalies,
            vec![Metric::EngineCoolantTemp, Metric::HydraulicPressure]
        );
        let investigation = rec
            .items
            .iter()
            .find(|i| i.kind == ItemKind::AnomalyInvestigation)
            .unwrap();
        assert!(investigation
            .description
            .contains("engine_coolant_temp, hydraulic_pressure"));
    }

    #[test]
    fn anomaly_never_downgrades_critical() {
        let anomalies = [anomaly(Metric::EngineCoolantTemp, true)];
        let rec = merge("T1", now(), &health(40.0), &anomalies, None);
        assert_eq!(rec.priority, Priority::Critical);
    }

    #[test]
    fn priority_is_invariant_to_signal_order() {
        let anomalies = [anomaly(Metric::EngineCoolantTemp, true)];
        let rul = rul_days(5.0);
        let signals = [
            escalate_health(&health(70.0)),
            escalate_rul(&rul),
            escalate_anomalies(&anomalies),
        ];

        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let baseline = combine(signals.iter().flatten().cloned());
        for order in orders {
            let permuted = order.iter().filter_map(|&i| signals[i].clone());
            assert_eq!(combine(permuted), baseline, "order {order:?}");
        }
        assert_eq!(baseline.0, Priority::High);
        assert!(baseline.1);
        let kinds: Vec<_> = baseline.2.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::ScheduledMaintenance,
                ItemKind::ComponentReplacement,
                ItemKind::AnomalyInvestigation,
            ]
        );
    }

    #[test]
    fn combine_is_associative() {
        let a = escalate_health(&health(80.0)).unwrap();
        let b = escalate_rul(&rul_days(1.0)).unwrap();
        let c = escalate_anomalies(&[anomaly(Metric::BatterySoh, true)]).unwrap();

        let (ab, _, _) = combine([a.clone(), b.clone()]);
        let (bc, _, _) = combine([b.clone(), c.clone()]);
        let (all, _, _) = combine([a, b, c]);
        assert_eq!(ab.max(Priority::High), all);
        assert_eq!(bc.max(Priority::Medium), all);
        assert_eq!(all, Priority::Critical);
    }

    #[test]
    fn recommendation_serializes_handoff_fields() {
        let rec = merge("TRACTOR_001", now(), &health(70.0), &[], None);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["vehicle_id"], "TRACTOR_001");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["action_required"], true);
        assert_eq!(json["health_score"], 70.0);
        assert_eq!(json["items"][0]["kind"], "scheduled_maintenance");
        assert_eq!(json["items"][0]["urgency"], "high");
        assert!(json["timestamp"].is_string());
        assert!(json.get("rul_prediction").is_none());
    }
}
