//! Rule-based fraud indicators.
//!
//! Each indicator is a pure function of the scored transaction and its
//! [`HistoricalContext`]. Scores are clamped to `[0, 100]`; an indicator that
//! does not fire scores 0 and records no rule.

pub mod account_takeover;
pub mod amount;
pub mod card_testing;
pub mod collusion;
pub mod fraud_ring;
pub mod geographic;
pub mod velocity;

#[cfg(test)]
pub(crate) mod test_support;

pub use account_takeover::AccountTakeoverIndicator;
pub use amount::AmountIndicator;
pub use card_testing::CardTestingIndicator;
pub use collusion::CollusionIndicator;
pub use fraud_ring::FraudRingIndicator;
pub use geographic::GeographicIndicator;
pub use velocity::VelocityIndicator;

use crate::context::HistoricalContext;
use crate::model::{IndicatorKind, IndicatorScores, Transaction, TriggeredRule};
use chrono::{DateTime, Utc};
use common::scoring::ScoringConfig;
use serde_json::Value;

pub const MAX_SCORE: f64 = 100.0;

pub trait Indicator: Send + Sync {
    fn kind(&self) -> IndicatorKind;

    fn evaluate(&self, transaction: &Transaction, context: &HistoricalContext) -> IndicatorOutcome;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorOutcome {
    pub score: f64,
    pub rules: Vec<TriggeredRule>,
}

impl IndicatorOutcome {
    /// Records a fired rule; the indicator keeps the strongest score seen.
    pub fn raise(
        &mut self,
        indicator: IndicatorKind,
        rule_id: &str,
        score: f64,
        description: String,
        evidence: Value,
    ) {
        self.score = self.score.max(score);
        self.push(indicator, rule_id, score, description, evidence);
    }

    /// Records a rule that adds on top of the current score.
    pub fn add_bonus(
        &mut self,
        indicator: IndicatorKind,
        rule_id: &str,
        bonus: f64,
        description: String,
        evidence: Value,
    ) {
        self.score = (self.score + bonus).min(MAX_SCORE);
        self.push(indicator, rule_id, bonus, description, evidence);
    }

    fn push(
        &mut self,
        indicator: IndicatorKind,
        rule_id: &str,
        score: f64,
        description: String,
        evidence: Value,
    ) {
        self.rules.push(TriggeredRule {
            indicator,
            rule_id: rule_id.to_string(),
            score,
            description,
            evidence,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorReport {
    pub scores: IndicatorScores,
    pub triggered_rules: Vec<TriggeredRule>,
}

pub struct IndicatorEngine {
    indicators: Vec<Box<dyn Indicator>>,
}

impl IndicatorEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            indicators: vec![
                Box::new(VelocityIndicator::new(config.velocity.clone())),
                Box::new(GeographicIndicator::new(config.geographic.clone())),
                Box::new(AmountIndicator::new(config.amount.clone())),
                Box::new(CardTestingIndicator::new(config.card_testing.clone())),
                Box::new(CollusionIndicator::new(config.collusion.clone())),
                Box::new(AccountTakeoverIndicator::new(config.account_takeover.clone())),
                Box::new(FraudRingIndicator::new(config.fraud_ring.clone())),
            ],
        }
    }

    pub fn evaluate(
        &self,
        transaction: &Transaction,
        context: &HistoricalContext,
    ) -> IndicatorReport {
        let mut report = IndicatorReport::default();
        for indicator in &self.indicators {
            let outcome = indicator.evaluate(transaction, context);
            report
                .scores
                .set(indicator.kind(), outcome.score.clamp(0.0, MAX_SCORE));
            report.triggered_rules.extend(outcome.rules);
        }
        report
    }
}

/// Fractional hours from `earlier` to `later`; negative when out of order.
pub(crate) fn hours_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
