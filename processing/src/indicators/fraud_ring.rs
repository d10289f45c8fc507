use super::{Indicator, IndicatorOutcome, hours_between, mean};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::{FraudRingConfig, count_tier_score};
use serde_json::json;
use std::collections::BTreeSet;

/// Several accounts sharing one device.
pub struct FraudRingIndicator {
    config: FraudRingConfig,
}

impl FraudRingIndicator {
    pub fn new(config: FraudRingConfig) -> Self {
        Self { config }
    }
}

impl Indicator for FraudRingIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::FraudRing
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let config = &self.config;
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::days(config.window_days);

        // the scored transaction is part of the device's activity
        let device_activity: Vec<&Transaction> = context
            .device
            .iter()
            .filter(|t| t.timestamp >= from)
            .chain(std::iter::once(transaction))
            .collect();
        let users: BTreeSet<&str> = device_activity.iter().map(|t| t.user_id.as_str()).collect();
        let user_count = users.len();

        if let Some(tier) = count_tier_score(&config.user_tiers, user_count) {
            let top = config.user_tiers.iter().map(|t| t.score).fold(f64::MIN, f64::max);
            let rule_id = if tier.score >= top {
                "FRAUD_RING_HIGH"
            } else {
                "FRAUD_RING_MODERATE"
            };
            outcome.raise(
                IndicatorKind::FraudRing,
                rule_id,
                tier.score,
                format!("{} users sharing device {}", user_count, transaction.device_id),
                json!({ "device_id": transaction.device_id, "users": users }),
            );
        }

        if user_count < config.bonus_min_users {
            return outcome;
        }

        let amounts: Vec<f64> = device_activity.iter().map(|t| t.amount).collect();
        let average = mean(&amounts);
        if average > 0.0 {
            let similar = amounts
                .iter()
                .filter(|a| ((*a - average) / average).abs() < config.similar_amount_tolerance)
                .count();
            let ratio = similar as f64 / amounts.len() as f64;
            if ratio > config.similar_amount_ratio {
                outcome.add_bonus(
                    IndicatorKind::FraudRing,
                    "FRAUD_RING_SIMILAR_AMOUNTS",
                    config.similar_amount_bonus,
                    format!(
                        "{:.0}% of device transactions within {:.0}% of average {:.2}",
                        ratio * 100.0,
                        config.similar_amount_tolerance * 100.0,
                        average
                    ),
                    json!({ "ratio": ratio, "average": average }),
                );
            }
        }

        if device_activity.len() >= config.cluster_min_transactions {
            let earliest = device_activity.iter().map(|t| t.timestamp).min();
            let latest = device_activity.iter().map(|t| t.timestamp).max();
            if let (Some(earliest), Some(latest)) = (earliest, latest) {
                let span_hours = hours_between(latest, earliest);
                if span_hours < config.cluster_hours {
                    outcome.add_bonus(
                        IndicatorKind::FraudRing,
                        "FRAUD_RING_TIME_CLUSTER",
                        config.cluster_bonus,
                        format!("{} transactions in {:.1}h", device_activity.len(), span_hours),
                        json!({ "transactions": device_activity.len(), "span_hours": span_hours }),
                    );
                }
            }
        }

        outcome
    }
}
