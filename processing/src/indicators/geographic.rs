use super::{Indicator, IndicatorOutcome, hours_between};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::GeographicConfig;
use serde_json::json;

/// Travel between consecutive pickups that no rider could have made.
pub struct GeographicIndicator {
    config: GeographicConfig,
}

impl GeographicIndicator {
    pub fn new(config: GeographicConfig) -> Self {
        Self { config }
    }

    /// Linear from the suspicious score at the suspicious speed to just
    /// below the impossible score at the impossible speed.
    fn suspicious_score(&self, speed_kmh: f64) -> f64 {
        let config = &self.config;
        let fraction = ((speed_kmh - config.suspicious_speed_kmh)
            / (config.impossible_speed_kmh - config.suspicious_speed_kmh))
            .clamp(0.0, 1.0);
        let ceiling = (config.impossible_score - 1.0).max(config.suspicious_score);
        let score = config.suspicious_score + (ceiling - config.suspicious_score) * fraction;
        (score * 10.0).round() / 10.0
    }
}

impl Indicator for GeographicIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Geographic
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let config = &self.config;
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::hours(config.window_hours);

        for previous in context
            .user
            .iter()
            .filter(|t| t.timestamp >= from)
            .take(config.lookback)
        {
            let elapsed_hours = hours_between(transaction.timestamp, previous.timestamp);
            if elapsed_hours <= 0.0 {
                continue;
            }
            let distance_km = previous.pickup.distance_km(&transaction.pickup);
            let speed_kmh = distance_km / elapsed_hours;
            let evidence = json!({
                "previous_transaction_id": previous.transaction_id,
                "from_city": previous.pickup.city,
                "to_city": transaction.pickup.city,
                "distance_km": (distance_km * 10.0).round() / 10.0,
                "elapsed_hours": (elapsed_hours * 100.0).round() / 100.0,
                "speed_kmh": speed_kmh.round(),
            });

            if speed_kmh > config.impossible_speed_kmh && distance_km > config.min_distance_km {
                outcome.raise(
                    IndicatorKind::Geographic,
                    "GEO_IMPOSSIBLE_TRAVEL",
                    config.impossible_score,
                    format!(
                        "{:.0}km in {:.1}h ({:.0}km/h) from {} to {}",
                        distance_km,
                        elapsed_hours,
                        speed_kmh,
                        previous.pickup.city,
                        transaction.pickup.city
                    ),
                    evidence,
                );
            } else if speed_kmh > config.suspicious_speed_kmh
                && distance_km > config.min_distance_km
            {
                outcome.raise(
                    IndicatorKind::Geographic,
                    "GEO_SUSPICIOUS_TRAVEL",
                    self.suspicious_score(speed_kmh),
                    format!("{:.0}km in {:.1}h ({:.0}km/h)", distance_km, elapsed_hours, speed_kmh),
                    evidence,
                );
            } else if previous.pickup.country != transaction.pickup.country
                && elapsed_hours < config.country_change_hours
            {
                outcome.raise(
                    IndicatorKind::Geographic,
                    "GEO_COUNTRY_CHANGE",
                    config.country_change_score,
                    format!(
                        "{} to {} in {:.1}h",
                        previous.pickup.country, transaction.pickup.country, elapsed_hours
                    ),
                    evidence,
                );
            }
        }

        outcome
    }
}
