use super::{Indicator, IndicatorOutcome};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::{CollusionConfig, count_tier_score};
use serde_json::json;

/// The same rider and driver meeting far more often than chance allows.
pub struct CollusionIndicator {
    config: CollusionConfig,
}

impl CollusionIndicator {
    pub fn new(config: CollusionConfig) -> Self {
        Self { config }
    }
}

impl Indicator for CollusionIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Collusion
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let config = &self.config;
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::days(config.window_days);

        let pair_rides: Vec<&Transaction> = context
            .user
            .iter()
            .filter(|t| t.timestamp >= from && t.driver_id == transaction.driver_id)
            .collect();
        let ride_count = pair_rides.len();

        if let Some(tier) = count_tier_score(&config.ride_tiers, ride_count) {
            let top = config.ride_tiers.iter().map(|t| t.score).fold(f64::MIN, f64::max);
            let rule_id = if tier.score >= top {
                "COLLUSION_HIGH"
            } else {
                "COLLUSION_MODERATE"
            };
            outcome.raise(
                IndicatorKind::Collusion,
                rule_id,
                tier.score,
                format!(
                    "{} rides between {} and {} in {} days",
                    ride_count, transaction.user_id, transaction.driver_id, config.window_days
                ),
                json!({
                    "user_id": transaction.user_id,
                    "driver_id": transaction.driver_id,
                    "ride_count": ride_count,
                }),
            );
        }

        let circular = pair_rides
            .iter()
            .filter(|t| t.is_circular(config.circular_radius_km))
            .count();
        if circular >= config.circular_min_rides {
            outcome.add_bonus(
                IndicatorKind::Collusion,
                "COLLUSION_CIRCULAR",
                config.circular_bonus,
                format!("{} circular routes (pickup near dropoff)", circular),
                json!({ "circular_rides": circular }),
            );
        }

        if ride_count >= config.current_circular_min_rides
            && transaction.is_circular(config.circular_radius_km)
        {
            let route_km = transaction.pickup.distance_km(&transaction.dropoff);
            outcome.add_bonus(
                IndicatorKind::Collusion,
                "COLLUSION_CIRCULAR_CURRENT",
                config.current_circular_bonus,
                format!("current route covers only {:.2}km", route_km),
                json!({ "route_km": route_km }),
            );
        }

        outcome
    }
}
