use super::{Indicator, IndicatorOutcome};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::{VelocityConfig, count_tier_score};
use serde_json::json;

/// Bursts of rides from one user, card or device.
pub struct VelocityIndicator {
    config: VelocityConfig,
}

impl VelocityIndicator {
    pub fn new(config: VelocityConfig) -> Self {
        Self { config }
    }
}

fn count_within(window: &[Transaction], transaction: &Transaction, hours: i64) -> usize {
    let from = transaction.timestamp - Duration::hours(hours);
    window.iter().filter(|t| t.timestamp >= from).count()
}

fn one_hour_rule(score: f64) -> &'static str {
    match score {
        s if s >= 100.0 => "VELOCITY_EXTREME",
        s if s >= 80.0 => "VELOCITY_VERY_HIGH",
        s if s >= 50.0 => "VELOCITY_HIGH",
        _ => "VELOCITY_MODERATE",
    }
}

impl Indicator for VelocityIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Velocity
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let mut outcome = IndicatorOutcome::default();

        let user_1h = count_within(&context.user, transaction, 1);
        let user_2h = count_within(&context.user, transaction, 2);
        let user_24h = count_within(&context.user, transaction, 24);
        let card_1h = count_within(&context.card, transaction, 1);
        let card_2h = count_within(&context.card, transaction, 2);
        let device_1h = count_within(&context.device, transaction, 1);

        let max_1h = user_1h.max(card_1h).max(device_1h);
        if let Some(tier) = count_tier_score(&self.config.one_hour_tiers, max_1h) {
            outcome.raise(
                IndicatorKind::Velocity,
                one_hour_rule(tier.score),
                tier.score,
                format!("{} transactions in 1h", max_1h),
                json!({ "user_1h": user_1h, "card_1h": card_1h, "device_1h": device_1h }),
            );
        }

        let max_2h = user_2h.max(card_2h);
        let two_hour = self.config.two_hour_tier;
        if max_2h >= two_hour.min_count {
            outcome.raise(
                IndicatorKind::Velocity,
                "VELOCITY_2H_HIGH",
                two_hour.score,
                format!("{} transactions in 2h", max_2h),
                json!({ "user_2h": user_2h, "card_2h": card_2h }),
            );
        }

        let day = self.config.day_tier;
        if user_24h >= day.min_count {
            outcome.raise(
                IndicatorKind::Velocity,
                "VELOCITY_24H_HIGH",
                day.score,
                format!("{} transactions in 24h", user_24h),
                json!({ "user_24h": user_24h }),
            );
        }

        outcome
    }
}
