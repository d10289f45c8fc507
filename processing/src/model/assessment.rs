use chrono::{DateTime, Utc};
use common::scoring::{IndicatorWeights, RiskThresholds};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display as EnumDisplay, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumDisplay, EnumString)]
pub enum RiskLevel {
    #[serde(rename = "low_risk")]
    #[strum(serialize = "low_risk")]
    Low,
    #[serde(rename = "medium_risk")]
    #[strum(serialize = "medium_risk")]
    Medium,
    #[serde(rename = "high_risk")]
    #[strum(serialize = "high_risk")]
    High,
}

impl RiskLevel {
    pub fn classify(score: i32, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumDisplay,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndicatorKind {
    Velocity,
    Geographic,
    CardTesting,
    Amount,
    Collusion,
    AccountTakeover,
    FraudRing,
}

/// The seven indicator sub-scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorScores {
    #[serde(rename = "velocity_score")]
    pub velocity: f64,
    #[serde(rename = "geographic_score")]
    pub geographic: f64,
    #[serde(rename = "card_testing_score")]
    pub card_testing: f64,
    #[serde(rename = "amount_score")]
    pub amount: f64,
    #[serde(rename = "collusion_score")]
    pub collusion: f64,
    #[serde(rename = "ato_score")]
    pub account_takeover: f64,
    #[serde(rename = "fraud_ring_score")]
    pub fraud_ring: f64,
}

impl IndicatorScores {
    pub fn get(&self, kind: IndicatorKind) -> f64 {
        match kind {
            IndicatorKind::Velocity => self.velocity,
            IndicatorKind::Geographic => self.geographic,
            IndicatorKind::CardTesting => self.card_testing,
            IndicatorKind::Amount => self.amount,
            IndicatorKind::Collusion => self.collusion,
            IndicatorKind::AccountTakeover => self.account_takeover,
            IndicatorKind::FraudRing => self.fraud_ring,
        }
    }

    pub fn set(&mut self, kind: IndicatorKind, score: f64) {
        let slot = match kind {
            IndicatorKind::Velocity => &mut self.velocity,
            IndicatorKind::Geographic => &mut self.geographic,
            IndicatorKind::CardTesting => &mut self.card_testing,
            IndicatorKind::Amount => &mut self.amount,
            IndicatorKind::Collusion => &mut self.collusion,
            IndicatorKind::AccountTakeover => &mut self.account_takeover,
            IndicatorKind::FraudRing => &mut self.fraud_ring,
        };
        *slot = score;
    }

    pub fn values(&self) -> [f64; 7] {
        [
            self.velocity,
            self.geographic,
            self.card_testing,
            self.amount,
            self.collusion,
            self.account_takeover,
            self.fraud_ring,
        ]
    }

    pub fn weighted_sum(&self, weights: &IndicatorWeights) -> f64 {
        self.velocity * weights.velocity
            + self.geographic * weights.geographic
            + self.card_testing * weights.card_testing
            + self.amount * weights.amount
            + self.collusion * weights.collusion
            + self.account_takeover * weights.account_takeover
            + self.fraud_ring * weights.fraud_ring
    }
}

/// Record of a single fired condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub indicator: IndicatorKind,
    /// Stable identifier such as `VELOCITY_EXTREME`.
    pub rule_id: String,
    pub score: f64,
    pub description: String,
    #[serde(default)]
    pub evidence: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub transaction_id: String,
    /// Final score after the optional model blend.
    pub risk_score: i32,
    pub rule_score: i32,
    pub risk_level: RiskLevel,
    #[serde(flatten)]
    pub indicators: IndicatorScores,
    pub ml_score: Option<f64>,
    pub triggered_rules: Vec<TriggeredRule>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverPassengerPair {
    pub user_id: String,
    pub driver_id: String,
    pub ride_count: i64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_transactions: i64,
    pub processed_transactions: i64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
    pub avg_risk_score: f64,
    /// High-risk share of processed transactions, in percent.
    pub fraud_rate: f64,
    pub total_amount_at_risk: f64,
}

/// Raw aggregates as read from a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardCounts {
    pub total_transactions: i64,
    pub processed_transactions: i64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
    pub risk_score_sum: f64,
    pub high_risk_amount: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl From<DashboardCounts> for DashboardMetrics {
    fn from(counts: DashboardCounts) -> Self {
        let (avg_risk_score, fraud_rate) = if counts.processed_transactions > 0 {
            let processed = counts.processed_transactions as f64;
            (
                counts.risk_score_sum / processed,
                counts.high_risk_count as f64 / processed * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total_transactions: counts.total_transactions,
            processed_transactions: counts.processed_transactions,
            high_risk_count: counts.high_risk_count,
            medium_risk_count: counts.medium_risk_count,
            low_risk_count: counts.low_risk_count,
            avg_risk_score: round_to(avg_risk_score, 1),
            fraud_rate: round_to(fraud_rate, 2),
            total_amount_at_risk: round_to(counts.high_risk_amount, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries() {
        let thresholds = RiskThresholds::default();
        assert_eq!(RiskLevel::classify(0, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(29, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(30, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(59, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(60, &thresholds), RiskLevel::High);
        assert_eq!(RiskLevel::classify(100, &thresholds), RiskLevel::High);
    }

    #[test]
    fn every_kind_has_its_own_slot() {
        use strum::IntoEnumIterator;

        let mut scores = IndicatorScores::default();
        for (i, kind) in IndicatorKind::iter().enumerate() {
            scores.set(kind, i as f64 + 1.0);
        }
        for (i, kind) in IndicatorKind::iter().enumerate() {
            assert_eq!(scores.get(kind), i as f64 + 1.0, "{}", kind);
        }
        assert_eq!(scores.values(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn risk_level_wire_names() {
        assert_eq!(RiskLevel::High.to_string(), "high_risk");
        assert_eq!(
            serde_json::to_value(RiskLevel::Medium).unwrap(),
            serde_json::json!("medium_risk")
        );
        assert_eq!("low_risk".parse::<RiskLevel>().unwrap(), RiskLevel::Low);
    }

    #[test]
    fn assessment_flattens_indicator_columns() {
        let assessment = RiskAssessment {
            transaction_id: "TXN-1".to_string(),
            risk_score: 42,
            rule_score: 42,
            risk_level: RiskLevel::Medium,
            indicators: IndicatorScores {
                account_takeover: 30.0,
                ..Default::default()
            },
            ml_score: None,
            triggered_rules: vec![],
            processed_at: Utc::now(),
        };
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["ato_score"], 30.0);
        assert_eq!(json["risk_level"], "medium_risk");
        assert!(json["ml_score"].is_null());
    }

    #[test]
    fn empty_dashboard_has_zero_rates() {
        let metrics = DashboardMetrics::from(DashboardCounts {
            total_transactions: 12,
            ..Default::default()
        });
        assert_eq!(metrics.total_transactions, 12);
        assert_eq!(metrics.avg_risk_score, 0.0);
        assert_eq!(metrics.fraud_rate, 0.0);
    }

    #[test]
    fn dashboard_rates_are_rounded() {
        let metrics = DashboardMetrics::from(DashboardCounts {
            total_transactions: 3,
            processed_transactions: 3,
            high_risk_count: 1,
            medium_risk_count: 1,
            low_risk_count: 1,
            risk_score_sum: 100.0,
            high_risk_amount: 1234.567,
        });
        assert_eq!(metrics.avg_risk_score, 33.3);
        assert_eq!(metrics.fraud_rate, 33.33);
        assert_eq!(metrics.total_amount_at_risk, 1234.57);
    }
}
