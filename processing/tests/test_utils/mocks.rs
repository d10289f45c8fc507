use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use processing::{
    estimator::{Estimate, ModelEstimator, ModelMetrics},
    model::{
        DashboardMetrics, DriverPassengerPair, FeatureVector, GenericError, RiskAssessment,
        Transaction,
    },
    storage::{AssessmentStore, PutOutcome, TransactionSource},
};

mock! {
    pub Source {}

    #[async_trait]
    impl TransactionSource for Source {
        async fn fetch_unprocessed(&self, limit: u32) -> Result<Vec<Transaction>, GenericError>;
        async fn windowed_by_user(
            &self,
            user_id: &str,
            until: DateTime<Utc>,
            hours: i64,
        ) -> Result<Vec<Transaction>, GenericError>;
        async fn windowed_by_card(
            &self,
            card_last4: &str,
            until: DateTime<Utc>,
            hours: i64,
        ) -> Result<Vec<Transaction>, GenericError>;
        async fn windowed_by_device(
            &self,
            device_id: &str,
            until: DateTime<Utc>,
            hours: i64,
        ) -> Result<Vec<Transaction>, GenericError>;
        async fn driver_passenger_pairs(
            &self,
            until: DateTime<Utc>,
            days: i64,
        ) -> Result<Vec<DriverPassengerPair>, GenericError>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl AssessmentStore for Store {
        async fn put_assessment(
            &self,
            assessment: &RiskAssessment,
        ) -> Result<PutOutcome, GenericError>;
        async fn get_assessment(
            &self,
            transaction_id: &str,
        ) -> Result<Option<RiskAssessment>, GenericError>;
        async fn dashboard_metrics(&self) -> Result<DashboardMetrics, GenericError>;
    }
}

mock! {
    pub Estimator {}

    #[async_trait]
    impl ModelEstimator for Estimator {
        fn active_model(&self) -> Option<ModelMetrics>;
        async fn predict(&self, features: &FeatureVector) -> Result<Estimate, GenericError>;
    }
}

/// Source with empty history windows; `fetch_unprocessed` is left to the test.
pub fn source_without_history() -> MockSource {
    let mut source = MockSource::new();
    source.expect_windowed_by_user().returning(|_, _, _| Ok(Vec::new()));
    source.expect_windowed_by_card().returning(|_, _, _| Ok(Vec::new()));
    source.expect_windowed_by_device().returning(|_, _, _| Ok(Vec::new()));
    source
}

pub fn accepting_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_put_assessment().returning(|_| Ok(PutOutcome::Inserted));
    store
}

pub fn model_metrics(is_active: bool) -> ModelMetrics {
    ModelMetrics {
        model_name: "ride_fraud_logreg".to_string(),
        model_type: "logistic_regression".to_string(),
        precision: 0.82,
        recall: 0.74,
        f1: 0.78,
        accuracy: 0.91,
        is_active,
        trained_at: None,
    }
}

pub fn estimator_returning(probability: f64) -> MockEstimator {
    let mut estimator = MockEstimator::new();
    estimator
        .expect_active_model()
        .returning(|| Some(model_metrics(true)));
    estimator
        .expect_predict()
        .returning(move |_| Ok(Estimate::Probability(probability)));
    estimator
}
