use super::{IndicatorScores, Transaction};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

pub const FEATURE_NAMES: [&str; 12] = [
    "velocity_score",
    "geographic_score",
    "amount_score",
    "card_testing_score",
    "collusion_score",
    "ato_score",
    "fraud_ring_score",
    "amount",
    "distance_km",
    "duration_minutes",
    "hour_of_day",
    "day_of_week",
];

/// Model input, laid out in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; 12],
}

impl FeatureVector {
    pub fn from_transaction(transaction: &Transaction, scores: &IndicatorScores) -> Self {
        let timestamp = transaction.timestamp;
        Self {
            values: [
                scores.velocity,
                scores.geographic,
                scores.amount,
                scores.card_testing,
                scores.collusion,
                scores.account_takeover,
                scores.fraud_ring,
                transaction.amount,
                transaction.distance_km,
                f64::from(transaction.duration_minutes),
                f64::from(timestamp.hour()),
                // Monday is 0
                f64::from(timestamp.weekday().num_days_from_monday()),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| self.values[index])
    }
}
