use super::rule_based::bounded;
use crate::estimator::{Estimate, ModelEstimator};
use crate::model::{FeatureVector, GenericError, RiskLevel};
use common::scoring::{HybridWeights, RiskThresholds, ScoringConfig};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridOutcome {
    pub final_score: i32,
    pub risk_level: RiskLevel,
    /// Model probability scaled to `[0, 100]`; `None` when scoring was rule-only.
    pub ml_score: Option<f64>,
}

/// Blends the rule score with the model when one is loaded and active.
pub struct HybridScorer {
    weights: HybridWeights,
    thresholds: RiskThresholds,
    estimator: Option<Arc<dyn ModelEstimator>>,
}

impl HybridScorer {
    pub fn new(config: &ScoringConfig, estimator: Option<Arc<dyn ModelEstimator>>) -> Self {
        Self {
            weights: config.hybrid,
            thresholds: config.risk_thresholds,
            estimator,
        }
    }

    pub fn rules_only(config: &ScoringConfig) -> Self {
        Self::new(config, None)
    }

    pub async fn score(
        &self,
        rule_score: i32,
        features: &FeatureVector,
    ) -> Result<HybridOutcome, GenericError> {
        let Some(estimator) = &self.estimator else {
            return Ok(self.rule_only(rule_score));
        };

        match estimator.active_model() {
            Some(model) if model.is_active => {
                trace!(model = %model.model_name, "Consulting model estimator");
            }
            _ => {
                debug!("No active model, scoring with rules only");
                return Ok(self.rule_only(rule_score));
            }
        }

        match estimator.predict(features).await? {
            Estimate::Unavailable => Ok(self.rule_only(rule_score)),
            Estimate::Probability(p) if (0.0..=1.0).contains(&p) => {
                let final_score = self.blend(rule_score, p);
                Ok(HybridOutcome {
                    final_score,
                    risk_level: RiskLevel::classify(final_score, &self.thresholds),
                    ml_score: Some((p * 1000.0).round() / 10.0),
                })
            }
            Estimate::Probability(p) => {
                Err(format!("model returned probability {} outside [0, 1]", p).into())
            }
        }
    }

    pub fn blend(&self, rule_score: i32, probability: f64) -> i32 {
        bounded(
            self.weights.rule_weight * f64::from(rule_score)
                + self.weights.model_weight * probability * 100.0,
        )
    }

    fn rule_only(&self, rule_score: i32) -> HybridOutcome {
        HybridOutcome {
            final_score: rule_score,
            risk_level: RiskLevel::classify(rule_score, &self.thresholds),
            ml_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::ModelMetrics;
    use async_trait::async_trait;

    struct FixedEstimator {
        active: bool,
        estimate: Estimate,
    }

    #[async_trait]
    impl ModelEstimator for FixedEstimator {
        fn active_model(&self) -> Option<ModelMetrics> {
            Some(ModelMetrics {
                model_name: "fixed".to_string(),
                model_type: "test".to_string(),
                precision: 1.0,
                recall: 1.0,
                f1: 1.0,
                accuracy: 1.0,
                is_active: self.active,
                trained_at: None,
            })
        }

        async fn predict(&self, _features: &FeatureVector) -> Result<Estimate, GenericError> {
            Ok(self.estimate)
        }
    }

    fn scorer(active: bool, estimate: Estimate) -> HybridScorer {
        HybridScorer::new(
            &ScoringConfig::default(),
            Some(Arc::new(FixedEstimator { active, estimate })),
        )
    }

    fn features() -> FeatureVector {
        FeatureVector { values: [0.0; 12] }
    }

    #[tokio::test]
    async fn rule_sixty_and_probability_point_eight_gives_seventy_two() {
        let outcome = scorer(true, Estimate::Probability(0.8))
            .score(60, &features())
            .await
            .unwrap();
        assert_eq!(outcome.final_score, 72);
        assert_eq!(outcome.risk_level, RiskLevel::High);
        assert_eq!(outcome.ml_score, Some(80.0));
    }

    #[tokio::test]
    async fn missing_model_keeps_rule_score() {
        let outcome = HybridScorer::rules_only(&ScoringConfig::default())
            .score(45, &features())
            .await
            .unwrap();
        assert_eq!(outcome.final_score, 45);
        assert_eq!(outcome.risk_level, RiskLevel::Medium);
        assert_eq!(outcome.ml_score, None);
    }

    #[tokio::test]
    async fn inactive_or_unavailable_model_keeps_rule_score() {
        let inactive = scorer(false, Estimate::Probability(0.99))
            .score(10, &features())
            .await
            .unwrap();
        assert_eq!((inactive.final_score, inactive.ml_score), (10, None));

        let unavailable = scorer(true, Estimate::Unavailable)
            .score(10, &features())
            .await
            .unwrap();
        assert_eq!((unavailable.final_score, unavailable.ml_score), (10, None));
    }

    #[tokio::test]
    async fn invalid_probability_is_an_error() {
        for p in [1.5, f64::NAN] {
            let result = scorer(true, Estimate::Probability(p)).score(10, &features()).await;
            assert!(result.is_err(), "probability {}", p);
        }
    }

    #[test]
    fn blend_is_bounded() {
        let scorer = HybridScorer::rules_only(&ScoringConfig::default());
        assert_eq!(scorer.blend(100, 1.0), 100);
        assert_eq!(scorer.blend(0, 0.0), 0);
        assert_eq!(scorer.blend(0, 0.5), 30);
    }
}
