use super::{Indicator, IndicatorOutcome};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::AccountTakeoverConfig;
use serde_json::json;

/// A new payment card showing up together with a new place or device.
pub struct AccountTakeoverIndicator {
    config: AccountTakeoverConfig,
}

impl AccountTakeoverIndicator {
    pub fn new(config: AccountTakeoverConfig) -> Self {
        Self { config }
    }
}

impl Indicator for AccountTakeoverIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::AccountTakeover
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let config = &self.config;
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::days(config.history_days);

        let history: Vec<&Transaction> = context
            .user
            .iter()
            .filter(|t| t.timestamp >= from)
            .collect();
        // newest first, so this is the previous transaction
        let Some(previous) = history.first() else {
            return outcome;
        };

        let new_card = !history.iter().any(|t| t.card_last4 == transaction.card_last4);
        let new_device = !history.iter().any(|t| t.device_id == transaction.device_id);
        let new_country = !history
            .iter()
            .any(|t| t.pickup.country == transaction.pickup.country);
        let new_city = !history.iter().any(|t| t.pickup.city == transaction.pickup.city);
        let minutes_since_previous =
            (transaction.timestamp - previous.timestamp).num_seconds() as f64 / 60.0;

        let evidence = json!({
            "card_last4": transaction.card_last4,
            "new_card": new_card,
            "new_device": new_device,
            "new_country": new_country,
            "new_city": new_city,
            "minutes_since_previous": minutes_since_previous.round(),
        });
        let card = &transaction.card_last4;

        if new_card && new_country {
            if minutes_since_previous <= config.rapid_change_minutes as f64 {
                outcome.raise(
                    IndicatorKind::AccountTakeover,
                    "ATO_RAPID_TAKEOVER",
                    config.new_card_new_country_rapid_score,
                    format!(
                        "new card ****{} in new country {} {:.0} minutes after the previous ride",
                        card, transaction.pickup.country, minutes_since_previous
                    ),
                    evidence,
                );
            } else {
                outcome.raise(
                    IndicatorKind::AccountTakeover,
                    "ATO_HIGH",
                    config.new_card_new_country_score,
                    format!("new card ****{} and new country {}", card, transaction.pickup.country),
                    evidence,
                );
            }
        } else if new_card && new_device {
            outcome.raise(
                IndicatorKind::AccountTakeover,
                "ATO_NEW_CARD_DEVICE",
                config.new_card_new_device_score,
                format!("new card ****{} on a new device", card),
                evidence,
            );
        } else if new_card && new_city {
            outcome.raise(
                IndicatorKind::AccountTakeover,
                "ATO_MODERATE",
                config.new_card_new_city_score,
                format!("new card ****{} and new city {}", card, transaction.pickup.city),
                evidence,
            );
        } else if new_card {
            outcome.raise(
                IndicatorKind::AccountTakeover,
                "ATO_NEW_CARD",
                config.new_card_score,
                format!("new card ****{} for user {}", card, transaction.user_id),
                evidence,
            );
        } else if new_device && new_country {
            outcome.raise(
                IndicatorKind::AccountTakeover,
                "ATO_NEW_DEVICE_COUNTRY",
                config.new_device_new_country_score,
                format!("new device and new country {}", transaction.pickup.country),
                evidence,
            );
        }

        outcome
    }
}
