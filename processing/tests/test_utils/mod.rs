#![allow(dead_code)]

pub mod mocks;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{config::ProcessorConfig, scoring::ScoringConfig};
use processing::{
    estimator::ModelEstimator,
    model::{Location, PaymentStatus, Transaction},
    pipeline::{PipelineController, PipelineSettings},
    processor::Processor,
    storage::InMemoryStorage,
};
use std::sync::Arc;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn location(city: &str, country: &str, lat: f64, lng: f64) -> Location {
    Location {
        city: city.to_string(),
        country: country.to_string(),
        lat,
        lng,
    }
}

pub fn lagos() -> Location {
    location("Lagos", "NG", 6.5244, 3.3792)
}

pub fn nairobi() -> Location {
    location("Nairobi", "KE", -1.2921, 36.8219)
}

/// Builder over a plain Lagos ride so each test only spells out what it varies.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            transaction: Transaction {
                transaction_id: id.to_string(),
                timestamp: base_time(),
                user_id: "USR-1".to_string(),
                driver_id: "DRV-1".to_string(),
                card_last4: "4242".to_string(),
                device_id: "DEV-1".to_string(),
                pickup: lagos(),
                dropoff: location("Lagos", "NG", 6.4550, 3.3941),
                distance_km: 8.0,
                duration_minutes: 22,
                amount: 2500.0,
                currency: "NGN".to_string(),
                payment_status: PaymentStatus::Completed,
            },
        }
    }

    pub fn minutes(mut self, minutes: i64) -> Self {
        self.transaction.timestamp = base_time() + Duration::minutes(minutes);
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.transaction.user_id = user_id.to_string();
        self
    }

    pub fn driver(mut self, driver_id: &str) -> Self {
        self.transaction.driver_id = driver_id.to_string();
        self
    }

    pub fn card(mut self, card_last4: &str) -> Self {
        self.transaction.card_last4 = card_last4.to_string();
        self
    }

    pub fn device(mut self, device_id: &str) -> Self {
        self.transaction.device_id = device_id.to_string();
        self
    }

    pub fn pickup(mut self, pickup: Location) -> Self {
        self.transaction.dropoff = pickup.clone();
        self.transaction.dropoff.lat += 0.05;
        self.transaction.pickup = pickup;
        self
    }

    pub fn amount(mut self, amount: f64, currency: &str) -> Self {
        self.transaction.amount = amount;
        self.transaction.currency = currency.to_string();
        self
    }

    pub fn build(self) -> Transaction {
        self.transaction
    }
}

pub fn ride(id: &str, minutes: i64) -> Transaction {
    TransactionBuilder::new(id).minutes(minutes).build()
}

/// `count` rides by USR-1, one every `spacing` minutes starting at [`base_time`].
pub fn ride_series(prefix: &str, count: usize, spacing: i64) -> Vec<Transaction> {
    (0..count)
        .map(|i| ride(&format!("{}-{:02}", prefix, i), i as i64 * spacing))
        .collect()
}

pub fn settings(batch_limit: u32, workers: usize) -> PipelineSettings {
    PipelineSettings::from(&ProcessorConfig {
        threads: workers as u32,
        sleep_ms: 20,
        batch_limit,
        log_level: "debug".to_string(),
    })
}

pub fn processor_over(
    storage: Arc<InMemoryStorage>,
    estimator: Option<Arc<dyn ModelEstimator>>,
) -> Processor {
    Processor::new(&ScoringConfig::default(), storage.clone(), storage, estimator)
        .expect("default scoring config is valid")
}

pub fn controller_over(storage: Arc<InMemoryStorage>, batch_limit: u32) -> PipelineController {
    PipelineController::new(Arc::new(processor_over(storage, None)), settings(batch_limit, 4))
}
