use crate::{
    context::{ContextWindows, HistoricalContext},
    error::ProcessingError,
    estimator::ModelEstimator,
    indicators::IndicatorEngine,
    model::{FeatureVector, RiskAssessment, Transaction},
    scorers::{CompositeScorer, HybridScorer},
    storage::{AssessmentStore, PutOutcome, TransactionSource},
};
use chrono::Utc;
use common::scoring::ScoringConfig;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ProcessedTransaction {
    pub assessment: RiskAssessment,
    pub outcome: PutOutcome,
}

/// Scores one transaction end to end: context, indicators, composite and
/// hybrid scoring, then the idempotent write.
pub struct Processor {
    source: Arc<dyn TransactionSource>,
    store: Arc<dyn AssessmentStore>,
    windows: ContextWindows,
    engine: IndicatorEngine,
    composite: CompositeScorer,
    hybrid: HybridScorer,
}

impl Processor {
    pub fn new(
        config: &ScoringConfig,
        source: Arc<dyn TransactionSource>,
        store: Arc<dyn AssessmentStore>,
        estimator: Option<Arc<dyn ModelEstimator>>,
    ) -> Result<Self, ProcessingError> {
        config.validate().map_err(ProcessingError::Config)?;
        info!(
            model = estimator.is_some(),
            escalation = config.escalation.is_some(),
            "Initializing new Processor"
        );
        Ok(Self {
            source,
            store,
            windows: ContextWindows::from_config(config),
            engine: IndicatorEngine::new(config),
            composite: CompositeScorer::new(config),
            hybrid: HybridScorer::new(config, estimator),
        })
    }

    pub fn source(&self) -> &Arc<dyn TransactionSource> {
        &self.source
    }

    /// Computes the assessment without storing it.
    pub async fn assess(
        &self,
        transaction: &Transaction,
    ) -> Result<RiskAssessment, ProcessingError> {
        let transaction_id = &transaction.transaction_id;
        transaction
            .validate()
            .map_err(|reason| ProcessingError::Validation {
                transaction_id: transaction_id.clone(),
                reason,
            })?;

        let context =
            HistoricalContext::fetch(self.source.as_ref(), transaction, self.windows).await?;
        let report = self.engine.evaluate(transaction, &context);
        let rule_score = self.composite.score(&report.scores);

        let features = FeatureVector::from_transaction(transaction, &report.scores);
        let hybrid = self
            .hybrid
            .score(rule_score, &features)
            .await
            .map_err(|source| ProcessingError::Estimator {
                transaction_id: transaction_id.clone(),
                source,
            })?;

        debug!(
            transaction_id = %transaction_id,
            rule_score,
            final_score = hybrid.final_score,
            rules = report.triggered_rules.len(),
            "Scored transaction"
        );

        Ok(RiskAssessment {
            transaction_id: transaction_id.clone(),
            risk_score: hybrid.final_score,
            rule_score,
            risk_level: hybrid.risk_level,
            indicators: report.scores,
            ml_score: hybrid.ml_score,
            triggered_rules: report.triggered_rules,
            processed_at: Utc::now(),
        })
    }

    pub async fn process(
        &self,
        transaction: &Transaction,
    ) -> Result<ProcessedTransaction, ProcessingError> {
        let assessment = self.assess(transaction).await?;
        let outcome = self
            .store
            .put_assessment(&assessment)
            .await
            .map_err(ProcessingError::Store)?;

        match outcome {
            PutOutcome::Inserted => info!(
                transaction_id = %assessment.transaction_id,
                risk_score = assessment.risk_score,
                risk_level = %assessment.risk_level,
                "Stored risk assessment"
            ),
            PutOutcome::AlreadyAssessed => debug!(
                transaction_id = %assessment.transaction_id,
                "Transaction already assessed, keeping stored assessment"
            ),
        }

        Ok(ProcessedTransaction { assessment, outcome })
    }
}
