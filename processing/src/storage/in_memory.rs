use super::{AssessmentStore, MIN_PAIR_RIDES, PutOutcome, TransactionSource};
use crate::model::{
    DashboardCounts, DashboardMetrics, DriverPassengerPair, GenericError, RiskAssessment, RiskLevel,
    Transaction,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local storage used by the replay binary and the tests.
///
/// Locks are always taken transactions first, then assessments.
#[derive(Default)]
pub struct InMemoryStorage {
    transactions: RwLock<Vec<Transaction>>,
    assessments: RwLock<HashMap<String, RiskAssessment>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let mut deduplicated: Vec<Transaction> = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            if !deduplicated
                .iter()
                .any(|known| known.transaction_id == transaction.transaction_id)
            {
                deduplicated.push(transaction);
            }
        }
        Self {
            transactions: RwLock::new(deduplicated),
            assessments: RwLock::new(HashMap::new()),
        }
    }

    /// Adds transactions, skipping identifiers already present. Returns how many were added.
    pub async fn insert_transactions(&self, batch: Vec<Transaction>) -> usize {
        let mut transactions = self.transactions.write().await;
        let mut inserted = 0;
        for transaction in batch {
            if transactions
                .iter()
                .any(|known| known.transaction_id == transaction.transaction_id)
            {
                debug!(transaction_id = %transaction.transaction_id, "Skipping known transaction");
                continue;
            }
            transactions.push(transaction);
            inserted += 1;
        }
        inserted
    }

    pub async fn unprocessed_count(&self) -> usize {
        let transactions = self.transactions.read().await;
        let assessments = self.assessments.read().await;
        transactions
            .iter()
            .filter(|t| !assessments.contains_key(&t.transaction_id))
            .count()
    }

    pub async fn assessment_count(&self) -> usize {
        self.assessments.read().await.len()
    }

    async fn windowed<F>(
        &self,
        until: DateTime<Utc>,
        hours: i64,
        matches: F,
    ) -> Result<Vec<Transaction>, GenericError>
    where
        F: Fn(&Transaction) -> bool + Send,
    {
        let from = until - Duration::hours(hours);
        let transactions = self.transactions.read().await;
        let mut window: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.timestamp >= from && t.timestamp <= until && matches(t))
            .cloned()
            .collect();
        window.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.transaction_id.cmp(&a.transaction_id))
        });
        Ok(window)
    }
}

#[async_trait]
impl TransactionSource for InMemoryStorage {
    async fn fetch_unprocessed(&self, limit: u32) -> Result<Vec<Transaction>, GenericError> {
        let transactions = self.transactions.read().await;
        let assessments = self.assessments.read().await;
        let mut pending: Vec<Transaction> = transactions
            .iter()
            .filter(|t| !assessments.contains_key(&t.transaction_id))
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn windowed_by_user(
        &self,
        user_id: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed(until, hours, |t| t.user_id == user_id).await
    }

    async fn windowed_by_card(
        &self,
        card_last4: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed(until, hours, |t| t.card_last4 == card_last4).await
    }

    async fn windowed_by_device(
        &self,
        device_id: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed(until, hours, |t| t.device_id == device_id).await
    }

    async fn driver_passenger_pairs(
        &self,
        until: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<DriverPassengerPair>, GenericError> {
        let from = until - Duration::days(days);
        let transactions = self.transactions.read().await;

        let mut totals: BTreeMap<(&str, &str), (i64, f64)> = BTreeMap::new();
        for t in transactions
            .iter()
            .filter(|t| t.timestamp >= from && t.timestamp <= until)
        {
            let entry = totals
                .entry((t.user_id.as_str(), t.driver_id.as_str()))
                .or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += t.amount;
        }

        let mut pairs: Vec<DriverPassengerPair> = totals
            .into_iter()
            .filter(|(_, (rides, _))| *rides >= MIN_PAIR_RIDES)
            .map(|((user_id, driver_id), (ride_count, total_amount))| DriverPassengerPair {
                user_id: user_id.to_string(),
                driver_id: driver_id.to_string(),
                ride_count,
                total_amount,
            })
            .collect();
        // stable sort keeps the (user, driver) order among equal counts
        pairs.sort_by(|a, b| b.ride_count.cmp(&a.ride_count));
        Ok(pairs)
    }
}

#[async_trait]
impl AssessmentStore for InMemoryStorage {
    async fn put_assessment(
        &self,
        assessment: &RiskAssessment,
    ) -> Result<PutOutcome, GenericError> {
        let mut assessments = self.assessments.write().await;
        if assessments.contains_key(&assessment.transaction_id) {
            return Ok(PutOutcome::AlreadyAssessed);
        }
        assessments.insert(assessment.transaction_id.clone(), assessment.clone());
        Ok(PutOutcome::Inserted)
    }

    async fn get_assessment(
        &self,
        transaction_id: &str,
    ) -> Result<Option<RiskAssessment>, GenericError> {
        Ok(self.assessments.read().await.get(transaction_id).cloned())
    }

    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, GenericError> {
        let transactions = self.transactions.read().await;
        let assessments = self.assessments.read().await;

        let amounts: HashMap<&str, f64> = transactions
            .iter()
            .map(|t| (t.transaction_id.as_str(), t.amount))
            .collect();

        let mut counts = DashboardCounts {
            total_transactions: transactions.len() as i64,
            processed_transactions: assessments.len() as i64,
            ..Default::default()
        };
        for assessment in assessments.values() {
            counts.risk_score_sum += f64::from(assessment.risk_score);
            match assessment.risk_level {
                RiskLevel::High => {
                    counts.high_risk_count += 1;
                    counts.high_risk_amount += amounts
                        .get(assessment.transaction_id.as_str())
                        .copied()
                        .unwrap_or_default();
                }
                RiskLevel::Medium => counts.medium_risk_count += 1,
                RiskLevel::Low => counts.low_risk_count += 1,
            }
        }

        Ok(counts.into())
    }
}
