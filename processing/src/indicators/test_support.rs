use crate::context::HistoricalContext;
use crate::model::{Location, PaymentStatus, Transaction};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn lagos() -> Location {
    Location {
        city: "Lagos".to_string(),
        country: "NG".to_string(),
        lat: 6.5244,
        lng: 3.3792,
    }
}

pub fn nairobi() -> Location {
    Location {
        city: "Nairobi".to_string(),
        country: "KE".to_string(),
        lat: -1.2921,
        lng: 36.8219,
    }
}

/// A Lagos ride by USR-1 with DRV-1, `minutes` relative to [`base_time`].
pub fn ride(id: &str, minutes: i64) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        timestamp: base_time() + Duration::minutes(minutes),
        user_id: "USR-1".to_string(),
        driver_id: "DRV-1".to_string(),
        card_last4: "4242".to_string(),
        device_id: "DEV-1".to_string(),
        pickup: lagos(),
        dropoff: Location {
            city: "Lagos".to_string(),
            country: "NG".to_string(),
            lat: 6.4550,
            lng: 3.3941,
        },
        distance_km: 8.0,
        duration_minutes: 22,
        amount: 2500.0,
        currency: "NGN".to_string(),
        payment_status: PaymentStatus::Completed,
    }
}

/// Uses the same history as user, card and device window.
pub fn context_for(current: &Transaction, history: Vec<Transaction>) -> HistoricalContext {
    HistoricalContext::new(current, history.clone(), history.clone(), history)
}
