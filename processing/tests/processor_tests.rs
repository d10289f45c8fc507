mod test_utils;

use common::scoring::ScoringConfig;
use processing::{
    error::ProcessingError,
    estimator::{Estimate, ModelEstimator},
    model::{RiskLevel, Transaction},
    processor::Processor,
    storage::PutOutcome,
};
use std::sync::Arc;
use test_utils::mocks::*;
use test_utils::*;

fn processor(source: MockSource, store: MockStore, estimator: Option<MockEstimator>) -> Processor {
    Processor::new(
        &ScoringConfig::default(),
        Arc::new(source),
        Arc::new(store),
        estimator.map(|e| Arc::new(e) as Arc<dyn ModelEstimator>),
    )
    .unwrap()
}

#[tokio::test]
async fn quiet_transaction_is_stored_as_low_risk() {
    let mut store = MockStore::new();
    store
        .expect_put_assessment()
        .withf(|assessment| assessment.transaction_id == "TXN-1" && assessment.risk_score == 0)
        .times(1)
        .returning(|_| Ok(PutOutcome::Inserted));

    let processed = processor(source_without_history(), store, None)
        .process(&ride("TXN-1", 0))
        .await
        .unwrap();

    assert_eq!(processed.outcome, PutOutcome::Inserted);
    assert_eq!(processed.assessment.risk_level, RiskLevel::Low);
    assert_eq!(processed.assessment.rule_score, 0);
    assert!(processed.assessment.triggered_rules.is_empty());
    assert_eq!(processed.assessment.ml_score, None);
}

#[tokio::test]
async fn invalid_transaction_is_rejected_before_any_lookup() {
    let mut store = MockStore::new();
    store.expect_put_assessment().never();
    let mut source = MockSource::new();
    source.expect_windowed_by_user().never();

    let mut transaction = ride("TXN-BAD", 0);
    transaction.card_last4 = "12".to_string();

    let err = processor(source, store, None)
        .process(&transaction)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Validation { .. }));
    assert_eq!(err.transaction_id(), Some("TXN-BAD"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn invalid_context_record_is_ignored() {
    let mut broken: Transaction = ride("TXN-0", -30);
    broken.amount = f64::NAN;

    let mut source = MockSource::new();
    source
        .expect_windowed_by_user()
        .returning(move |_, _, _| Ok(vec![broken.clone()]));
    source.expect_windowed_by_card().returning(|_, _, _| Ok(Vec::new()));
    source.expect_windowed_by_device().returning(|_, _, _| Ok(Vec::new()));

    let processed = processor(source, accepting_store(), None)
        .process(&ride("TXN-1", 0))
        .await
        .unwrap();
    assert_eq!(processed.outcome, PutOutcome::Inserted);
    assert_eq!(processed.assessment.transaction_id, "TXN-1");
    assert_eq!(processed.assessment.indicators.amount, 0.0);
    assert_eq!(processed.assessment.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn windows_are_anchored_at_the_transaction_time() {
    let transaction = ride("TXN-1", 90);
    let until = transaction.timestamp;

    let mut source = MockSource::new();
    source
        .expect_windowed_by_user()
        .withf(move |user_id, at, _| user_id == "USR-1" && *at == until)
        .returning(|_, _, _| Ok(Vec::new()));
    source
        .expect_windowed_by_card()
        .withf(move |card, at, _| card == "4242" && *at == until)
        .returning(|_, _, _| Ok(Vec::new()));
    source
        .expect_windowed_by_device()
        .withf(move |device, at, _| device == "DEV-1" && *at == until)
        .returning(|_, _, _| Ok(Vec::new()));

    processor(source, accepting_store(), None)
        .process(&transaction)
        .await
        .unwrap();
}

#[tokio::test]
async fn unreachable_source_is_fatal() {
    let mut source = MockSource::new();
    source
        .expect_windowed_by_user()
        .returning(|_, _, _| Err("connection refused".into()));
    source.expect_windowed_by_card().returning(|_, _, _| Ok(Vec::new()));
    source.expect_windowed_by_device().returning(|_, _, _| Ok(Vec::new()));

    let err = processor(source, accepting_store(), None)
        .process(&ride("TXN-1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Source(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn unreachable_store_is_fatal() {
    let mut store = MockStore::new();
    store
        .expect_put_assessment()
        .returning(|_| Err("connection reset".into()));

    let err = processor(source_without_history(), store, None)
        .process(&ride("TXN-1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Store(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn existing_assessment_is_reported_not_failed() {
    let mut store = MockStore::new();
    store
        .expect_put_assessment()
        .returning(|_| Ok(PutOutcome::AlreadyAssessed));

    let processed = processor(source_without_history(), store, None)
        .process(&ride("TXN-1", 0))
        .await
        .unwrap();
    assert_eq!(processed.outcome, PutOutcome::AlreadyAssessed);
}

#[tokio::test]
async fn active_model_is_blended_into_final_score() {
    let processed = processor(
        source_without_history(),
        accepting_store(),
        Some(estimator_returning(0.8)),
    )
    .process(&ride("TXN-1", 0))
    .await
    .unwrap();

    let assessment = processed.assessment;
    assert_eq!(assessment.rule_score, 0);
    assert_eq!(assessment.risk_score, 48);
    assert_eq!(assessment.risk_level, RiskLevel::Medium);
    assert_eq!(assessment.ml_score, Some(80.0));
}

#[tokio::test]
async fn inactive_model_is_never_consulted() {
    let mut estimator = MockEstimator::new();
    estimator
        .expect_active_model()
        .returning(|| Some(model_metrics(false)));
    estimator.expect_predict().never();

    let assessment = processor(source_without_history(), accepting_store(), Some(estimator))
        .assess(&ride("TXN-1", 0))
        .await
        .unwrap();
    assert_eq!(assessment.risk_score, assessment.rule_score);
    assert_eq!(assessment.ml_score, None);
}

#[tokio::test]
async fn unavailable_estimate_falls_back_to_rules() {
    let mut estimator = MockEstimator::new();
    estimator
        .expect_active_model()
        .returning(|| Some(model_metrics(true)));
    estimator
        .expect_predict()
        .times(1)
        .returning(|_| Ok(Estimate::Unavailable));

    let assessment = processor(source_without_history(), accepting_store(), Some(estimator))
        .assess(&ride("TXN-1", 0))
        .await
        .unwrap();
    assert_eq!(assessment.risk_score, assessment.rule_score);
    assert_eq!(assessment.ml_score, None);
}

#[tokio::test]
async fn estimator_failure_skips_the_transaction() {
    let mut estimator = MockEstimator::new();
    estimator
        .expect_active_model()
        .returning(|| Some(model_metrics(true)));
    estimator
        .expect_predict()
        .returning(|_| Err("model server timed out".into()));
    let mut store = MockStore::new();
    store.expect_put_assessment().never();

    let err = processor(source_without_history(), store, Some(estimator))
        .process(&ride("TXN-1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Estimator { .. }));
    assert_eq!(err.transaction_id(), Some("TXN-1"));
    assert!(!err.is_fatal());
}

#[test]
fn invalid_scoring_config_is_rejected() {
    let mut config = ScoringConfig::default();
    config.weights.velocity = 0.9;

    let result = Processor::new(
        &config,
        Arc::new(MockSource::new()),
        Arc::new(MockStore::new()),
        None,
    );
    assert!(matches!(result, Err(ProcessingError::Config(_))));
}
