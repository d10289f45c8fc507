use super::{Indicator, IndicatorOutcome, mean};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::CardTestingConfig;
use serde_json::json;

/// Small probe charges on a card followed by a large one.
pub struct CardTestingIndicator {
    config: CardTestingConfig,
}

impl CardTestingIndicator {
    pub fn new(config: CardTestingConfig) -> Self {
        Self { config }
    }
}

impl Indicator for CardTestingIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::CardTesting
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let config = &self.config;
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::hours(config.window_hours);

        let recent: Vec<&Transaction> = context
            .card
            .iter()
            .filter(|t| t.timestamp >= from && t.timestamp < transaction.timestamp)
            .collect();
        if recent.is_empty() {
            return outcome;
        }

        let small_threshold = config.small_threshold(&transaction.currency);
        let probes: Vec<f64> = recent
            .iter()
            .map(|t| t.amount)
            .filter(|amount| *amount < small_threshold)
            .collect();
        let amount = transaction.amount;

        if probes.len() >= config.min_probes {
            let probe_average = mean(&probes);
            let evidence = json!({
                "card_last4": transaction.card_last4,
                "probes": probes.len(),
                "probe_average": probe_average,
                "amount": amount,
            });
            if amount > probe_average * config.confirmed_multiplier {
                outcome.raise(
                    IndicatorKind::CardTesting,
                    "CARD_TESTING_CONFIRMED",
                    config.confirmed_score,
                    format!(
                        "{} small charges (avg {:.2}) then {:.2}",
                        probes.len(),
                        probe_average,
                        amount
                    ),
                    evidence,
                );
            } else if amount > probe_average * config.likely_multiplier {
                outcome.raise(
                    IndicatorKind::CardTesting,
                    "CARD_TESTING_LIKELY",
                    config.likely_score,
                    format!("{} small charges then {:.2}", probes.len(), amount),
                    evidence,
                );
            } else {
                outcome.raise(
                    IndicatorKind::CardTesting,
                    "CARD_TESTING_PROBING",
                    config.probing_score,
                    format!(
                        "{} small charges on card ****{}",
                        probes.len(),
                        transaction.card_last4
                    ),
                    evidence,
                );
            }
        } else if probes.len() >= config.possible_min_probes
            && amount > small_threshold * config.possible_multiplier
        {
            outcome.raise(
                IndicatorKind::CardTesting,
                "CARD_TESTING_POSSIBLE",
                config.possible_score,
                format!("{} small charges before {:.2}", probes.len(), amount),
                json!({
                    "card_last4": transaction.card_last4,
                    "probes": probes.len(),
                    "small_threshold": small_threshold,
                    "amount": amount,
                }),
            );
        }

        outcome
    }
}
