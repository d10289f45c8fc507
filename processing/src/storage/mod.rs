pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStorage;
pub use postgres::PostgresStorage;

use crate::model::{
    DashboardMetrics, DriverPassengerPair, GenericError, RiskAssessment, Transaction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Pairs below this many rides are not listed.
pub const MIN_PAIR_RIDES: i64 = 5;

/// Read side of the transaction store.
///
/// Windowed queries return transactions with `until - hours <= timestamp <= until`,
/// newest first. Anchoring the window at `until` rather than the wall clock keeps
/// rescoring a transaction deterministic.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Transactions without an assessment, oldest first.
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

    /// Pairs with at least [`MIN_PAIR_RIDES`] rides in the trailing `days`,
    /// most rides first.
    async fn driver_passenger_pairs(
        &self,
        until: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<DriverPassengerPair>, GenericError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// An assessment for the transaction already exists and was left untouched.
    AlreadyAssessed,
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Stores the assessment unless one exists for the same transaction.
    async fn put_assessment(&self, assessment: &RiskAssessment) -> Result<PutOutcome, GenericError>;

    async fn get_assessment(
        &self,
        transaction_id: &str,
    ) -> Result<Option<RiskAssessment>, GenericError>;

    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, GenericError>;
}
