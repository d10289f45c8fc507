use super::{AssessmentStore, MIN_PAIR_RIDES, PutOutcome, TransactionSource};
use crate::model::{
    DashboardCounts, DashboardMetrics, DriverPassengerPair, GenericError, IndicatorScores, Location,
    PaymentStatus, RiskAssessment, Transaction,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, FromQueryResult, Statement, Value,
};
use tracing::{debug, info};

const TRANSACTION_COLUMNS: &str = "t.transaction_id, t.timestamp, t.user_id, t.driver_id, \
     t.card_last4, t.device_id, t.pickup_city, t.pickup_country, t.pickup_lat, t.pickup_lng, \
     t.dropoff_city, t.dropoff_country, t.dropoff_lat, t.dropoff_lng, t.distance_km, \
     t.duration_minutes, t.amount, t.currency, t.payment_status";

#[derive(Debug, FromQueryResult)]
struct TransactionRow {
    transaction_id: String,
    timestamp: DateTime<Utc>,
    user_id: String,
    driver_id: String,
    card_last4: String,
    device_id: String,
    pickup_city: String,
    pickup_country: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_city: String,
    dropoff_country: Option<String>,
    dropoff_lat: f64,
    dropoff_lng: f64,
    distance_km: f64,
    duration_minutes: i32,
    amount: f64,
    currency: String,
    payment_status: String,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        // statuses added upstream land in PaymentStatus::Other
        let payment_status = row
            .payment_status
            .parse()
            .unwrap_or_else(|_| PaymentStatus::Other(row.payment_status.clone()));
        Transaction {
            transaction_id: row.transaction_id,
            timestamp: row.timestamp,
            user_id: row.user_id,
            driver_id: row.driver_id,
            card_last4: row.card_last4,
            device_id: row.device_id,
            pickup: Location {
                city: row.pickup_city,
                country: row.pickup_country,
                lat: row.pickup_lat,
                lng: row.pickup_lng,
            },
            dropoff: Location {
                city: row.dropoff_city,
                country: row.dropoff_country.unwrap_or_default(),
                lat: row.dropoff_lat,
                lng: row.dropoff_lng,
            },
            distance_km: row.distance_km,
            duration_minutes: row.duration_minutes,
            amount: row.amount,
            currency: row.currency,
            payment_status,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct AssessmentRow {
    transaction_id: String,
    risk_score: i32,
    rule_score: i32,
    risk_level: String,
    velocity_score: f64,
    geographic_score: f64,
    card_testing_score: f64,
    amount_score: f64,
    collusion_score: f64,
    ato_score: f64,
    fraud_ring_score: f64,
    ml_score: Option<f64>,
    triggered_rules: serde_json::Value,
    processed_at: DateTime<Utc>,
}

impl TryFrom<AssessmentRow> for RiskAssessment {
    type Error = GenericError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        Ok(RiskAssessment {
            risk_level: row.risk_level.parse()?,
            triggered_rules: serde_json::from_value(row.triggered_rules)?,
            transaction_id: row.transaction_id,
            risk_score: row.risk_score,
            rule_score: row.rule_score,
            indicators: IndicatorScores {
                velocity: row.velocity_score,
                geographic: row.geographic_score,
                card_testing: row.card_testing_score,
                amount: row.amount_score,
                collusion: row.collusion_score,
                account_takeover: row.ato_score,
                fraud_ring: row.fraud_ring_score,
            },
            ml_score: row.ml_score,
            processed_at: row.processed_at,
        })
    }
}

#[derive(Debug, FromQueryResult)]
struct PairRow {
    user_id: String,
    driver_id: String,
    ride_count: i64,
    total_amount: f64,
}

#[derive(Debug, FromQueryResult)]
struct DashboardRow {
    total_transactions: i64,
    processed_transactions: i64,
    high_risk_count: i64,
    medium_risk_count: i64,
    low_risk_count: i64,
    risk_score_sum: f64,
    high_risk_amount: f64,
}

/// PostgreSQL-backed source and store. Both traits share one connection pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pub db: DatabaseConnection,
}

impl PostgresStorage {
    pub async fn new(database_url: &str) -> Result<Self, GenericError> {
        let db = Database::connect(database_url).await?;
        info!("Connected to transaction database");
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn initialize_schema(&self) -> Result<(), GenericError> {
        let init_sql = include_str!("../../resources/init.sql");
        self.db.execute_unprepared(init_sql).await?;
        Ok(())
    }

    async fn query_transactions(
        &self,
        sql: String,
        values: Vec<Value>,
    ) -> Result<Vec<Transaction>, GenericError> {
        let rows = TransactionRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            values,
        ))
        .all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn windowed(
        &self,
        column: &str,
        key: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             WHERE t.{column} = $1 AND t.timestamp >= $2 AND t.timestamp <= $3 \
             ORDER BY t.timestamp DESC, t.transaction_id DESC"
        );
        let from = until - Duration::hours(hours);
        self.query_transactions(sql, vec![key.into(), from.into(), until.into()])
            .await
    }
}

#[async_trait]
impl TransactionSource for PostgresStorage {
    async fn fetch_unprocessed(&self, limit: u32) -> Result<Vec<Transaction>, GenericError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             LEFT JOIN risk_assessments r ON r.transaction_id = t.transaction_id \
             WHERE r.transaction_id IS NULL \
             ORDER BY t.timestamp ASC, t.transaction_id ASC \
             LIMIT $1"
        );
        let batch = self
            .query_transactions(sql, vec![i64::from(limit).into()])
            .await?;
        debug!(batch_size = batch.len(), "Fetched unprocessed transactions");
        Ok(batch)
    }

    async fn windowed_by_user(
        &self,
        user_id: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed("user_id", user_id, until, hours).await
    }

    async fn windowed_by_card(
        &self,
        card_last4: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed("card_last4", card_last4, until, hours).await
    }

    async fn windowed_by_device(
        &self,
        device_id: &str,
        until: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Transaction>, GenericError> {
        self.windowed("device_id", device_id, until, hours).await
    }

    async fn driver_passenger_pairs(
        &self,
        until: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<DriverPassengerPair>, GenericError> {
        let sql = "SELECT user_id, driver_id, COUNT(*) AS ride_count, \
                   COALESCE(SUM(amount), 0)::float8 AS total_amount \
                   FROM transactions \
                   WHERE timestamp >= $1 AND timestamp <= $2 \
                   GROUP BY user_id, driver_id \
                   HAVING COUNT(*) >= $3 \
                   ORDER BY ride_count DESC, user_id, driver_id";
        let from = until - Duration::days(days);
        let rows = PairRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [from.into(), until.into(), MIN_PAIR_RIDES.into()],
        ))
        .all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DriverPassengerPair {
                user_id: row.user_id,
                driver_id: row.driver_id,
                ride_count: row.ride_count,
                total_amount: row.total_amount,
            })
            .collect())
    }
}

#[async_trait]
impl AssessmentStore for PostgresStorage {
    async fn put_assessment(
        &self,
        assessment: &RiskAssessment,
    ) -> Result<PutOutcome, GenericError> {
        let sql = "INSERT INTO risk_assessments (transaction_id, risk_score, rule_score, \
                   risk_level, velocity_score, geographic_score, card_testing_score, \
                   amount_score, collusion_score, ato_score, fraud_ring_score, ml_score, \
                   triggered_rules, processed_at) \
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
                   ON CONFLICT (transaction_id) DO NOTHING";
        let scores = &assessment.indicators;
        let values: Vec<Value> = vec![
            assessment.transaction_id.as_str().into(),
            assessment.risk_score.into(),
            assessment.rule_score.into(),
            assessment.risk_level.to_string().into(),
            scores.velocity.into(),
            scores.geographic.into(),
            scores.card_testing.into(),
            scores.amount.into(),
            scores.collusion.into(),
            scores.account_takeover.into(),
            scores.fraud_ring.into(),
            assessment.ml_score.into(),
            serde_json::to_value(&assessment.triggered_rules)?.into(),
            assessment.processed_at.into(),
        ];

        let result = self
            .db
            .execute(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await?;

        if result.rows_affected() == 0 {
            debug!(transaction_id = %assessment.transaction_id, "Assessment already stored");
            Ok(PutOutcome::AlreadyAssessed)
        } else {
            Ok(PutOutcome::Inserted)
        }
    }

    async fn get_assessment(
        &self,
        transaction_id: &str,
    ) -> Result<Option<RiskAssessment>, GenericError> {
        let sql = "SELECT transaction_id, risk_score, rule_score, risk_level, velocity_score, \
                   geographic_score, card_testing_score, amount_score, collusion_score, ato_score, \
                   fraud_ring_score, ml_score, triggered_rules, processed_at \
                   FROM risk_assessments WHERE transaction_id = $1";
        let row = AssessmentRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [transaction_id.into()],
        ))
        .one(&self.db)
        .await?;

        row.map(RiskAssessment::try_from).transpose()
    }

    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, GenericError> {
        let sql = "SELECT \
                   (SELECT COUNT(*) FROM transactions) AS total_transactions, \
                   COUNT(r.transaction_id) AS processed_transactions, \
                   COUNT(*) FILTER (WHERE r.risk_level = 'high_risk') AS high_risk_count, \
                   COUNT(*) FILTER (WHERE r.risk_level = 'medium_risk') AS medium_risk_count, \
                   COUNT(*) FILTER (WHERE r.risk_level = 'low_risk') AS low_risk_count, \
                   COALESCE(SUM(r.risk_score), 0)::float8 AS risk_score_sum, \
                   COALESCE(SUM(t.amount) FILTER (WHERE r.risk_level = 'high_risk'), 0)::float8 \
                   AS high_risk_amount \
                   FROM risk_assessments r \
                   JOIN transactions t ON t.transaction_id = r.transaction_id";
        let row = DashboardRow::find_by_statement(Statement::from_string(DbBackend::Postgres, sql))
            .one(&self.db)
            .await?;

        let counts = row
            .map(|row| DashboardCounts {
                total_transactions: row.total_transactions,
                processed_transactions: row.processed_transactions,
                high_risk_count: row.high_risk_count,
                medium_risk_count: row.medium_risk_count,
                low_risk_count: row.low_risk_count,
                risk_score_sum: row.risk_score_sum,
                high_risk_amount: row.high_risk_amount,
            })
            .unwrap_or_default();
        Ok(counts.into())
    }
}
