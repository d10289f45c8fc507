use crate::model::{IndicatorScores, RiskLevel};
use common::scoring::{
    EscalationConfig, IndicatorWeights, RiskThresholds, ScoringConfig, count_tier_score,
};

pub const MIN_RISK_SCORE: i32 = 0;
pub const MAX_RISK_SCORE: i32 = 100;

pub(crate) fn bounded(score: f64) -> i32 {
    if score.is_nan() {
        return MIN_RISK_SCORE;
    }
    (score.round() as i32).clamp(MIN_RISK_SCORE, MAX_RISK_SCORE)
}

/// Weighted sum of the indicator scores, optionally lifted by escalation floors.
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: IndicatorWeights,
    thresholds: RiskThresholds,
    escalation: Option<EscalationConfig>,
}

impl CompositeScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            thresholds: config.risk_thresholds,
            escalation: config.escalation.clone(),
        }
    }

    pub fn score(&self, indicators: &IndicatorScores) -> i32 {
        let weighted = bounded(indicators.weighted_sum(&self.weights));
        match &self.escalation {
            Some(escalation) => escalate(weighted, indicators, escalation),
            None => weighted,
        }
    }

    pub fn classify(&self, score: i32) -> RiskLevel {
        RiskLevel::classify(score, &self.thresholds)
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }
}

fn escalate(score: i32, indicators: &IndicatorScores, escalation: &EscalationConfig) -> i32 {
    let values = indicators.values();
    let strongest = values.iter().copied().fold(0.0, f64::max);

    let single_floor = escalation
        .strongest_indicator
        .iter()
        .filter(|tier| strongest >= tier.min_count as f64)
        .map(|tier| tier.score)
        .fold(f64::MIN, f64::max);

    let strong_count = values
        .iter()
        .filter(|v| **v >= escalation.strong_indicator_score)
        .count();
    let combined_floor = count_tier_score(&escalation.strong_indicator_count, strong_count)
        .map(|tier| tier.score)
        .unwrap_or(f64::MIN);

    let floor = single_floor.max(combined_floor);
    if floor > f64::from(score) {
        bounded(floor)
    } else {
        score
    }
}
