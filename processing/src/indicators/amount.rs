use super::{Indicator, IndicatorOutcome, mean};
use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, Transaction};
use chrono::Duration;
use common::scoring::{AmountConfig, value_tier_score};
use serde_json::json;

/// Amounts far from the user's own spending in the same currency.
pub struct AmountIndicator {
    config: AmountConfig,
}

impl AmountIndicator {
    pub fn new(config: AmountConfig) -> Self {
        Self { config }
    }
}

/// Population z-score; a flat history yields 0.
pub fn z_score(value: f64, history: &[f64]) -> f64 {
    let mu = mean(history);
    let variance =
        history.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / history.len().max(1) as f64;
    let std = variance.sqrt();
    if std > f64::EPSILON {
        (value - mu) / std
    } else {
        0.0
    }
}

impl Indicator for AmountIndicator {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Amount
    }

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome {
        let mut outcome = IndicatorOutcome::default();
        let from = transaction.timestamp - Duration::hours(self.config.window_hours);

        let history: Vec<f64> = context
            .user
            .iter()
            .filter(|t| t.timestamp >= from && t.currency == transaction.currency)
            .map(|t| t.amount)
            .collect();
        if history.len() < self.config.min_history {
            return outcome;
        }

        let z = z_score(transaction.amount, &history);
        let Some(tier) = value_tier_score(&self.config.z_tiers, z.abs()) else {
            return outcome;
        };

        let top_score = self
            .config
            .z_tiers
            .iter()
            .map(|t| t.score)
            .fold(f64::MIN, f64::max);
        let rule_id = if tier.score >= top_score {
            "AMOUNT_EXTREME"
        } else {
            "AMOUNT_HIGH"
        };
        let average = mean(&history);
        outcome.raise(
            IndicatorKind::Amount,
            rule_id,
            tier.score,
            format!(
                "z-score {:.1}, amount {:.2} vs average {:.2}",
                z, transaction.amount, average
            ),
            json!({
                "z_score": (z * 100.0).round() / 100.0,
                "amount": transaction.amount,
                "average": average,
                "samples": history.len(),
            }),
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::*;

    fn history(amounts: &[f64]) -> Vec<Transaction> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                let mut t = ride(&format!("TXN-{i}"), -(i as i64 + 1) * 60 * 24);
                t.amount = *amount;
                t
            })
            .collect()
    }

    fn evaluate(amount: f64, amounts: &[f64]) -> IndicatorOutcome {
        let mut current = ride("TXN-NOW", 0);
        current.amount = amount;
        AmountIndicator::new(AmountConfig::default())
            .evaluate(&current, &context_for(&current, history(amounts)))
    }

    #[test]
    fn z_score_of_flat_history_is_zero() {
        assert_eq!(z_score(9000.0, &[1000.0, 1000.0, 1000.0]), 0.0);
    }

    #[test]
    fn population_standard_deviation_is_used() {
        // mean 5, population std 2
        let z = z_score(11.0, &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn short_history_never_fires() {
        let outcome = evaluate(50_000.0, &[1000.0, 1200.0, 900.0, 1100.0]);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn tiers_follow_absolute_z() {
        let amounts = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(evaluate(10.0, &amounts).score, 50.0);
        assert_eq!(evaluate(12.0, &amounts).score, 80.0);
        assert_eq!(evaluate(12.0, &amounts).rules[0].rule_id, "AMOUNT_EXTREME");
        // unusually small charges count as well
        assert_eq!(evaluate(0.5, &amounts).score, 50.0);
        assert_eq!(evaluate(8.0, &amounts).score, 0.0);
    }

    #[test]
    fn other_currencies_are_not_compared() {
        let mut current = ride("TXN-NOW", 0);
        current.amount = 12.0;
        current.currency = "KES".to_string();
        let past = history(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let outcome = AmountIndicator::new(AmountConfig::default())
            .evaluate(&current, &context_for(&current, past));
        assert_eq!(outcome.score, 0.0);
    }
}
