use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display as EnumDisplay, EnumString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    /// Empty when the upstream record does not carry a country for this point.
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Location) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
    Refunded,
    /// Any status the upstream system adds later, kept verbatim.
    #[serde(untagged)]
    #[strum(default)]
    Other(String),
}

/// A completed ride and its payment. Produced upstream and never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub driver_id: String,
    pub card_last4: String,
    pub device_id: String,
    pub pickup: Location,
    pub dropoff: Location,
    pub distance_km: f64,
    pub duration_minutes: i32,
    pub amount: f64,
    pub currency: String,
    pub payment_status: PaymentStatus,
}

impl Transaction {
    /// Checks the fields the indicators rely on.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("transaction_id", &self.transaction_id),
            ("user_id", &self.user_id),
            ("driver_id", &self.driver_id),
            ("device_id", &self.device_id),
            ("currency", &self.currency),
            ("pickup.country", &self.pickup.country),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("{} is empty", name));
        }

        if self.card_last4.len() != 4 || !self.card_last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("card_last4 {:?} is not four digits", self.card_last4));
        }

        for (name, point) in [("pickup", &self.pickup), ("dropoff", &self.dropoff)] {
            if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
                return Err(format!(
                    "{} coordinates ({}, {}) out of range",
                    name, point.lat, point.lng
                ));
            }
        }

        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!("amount {} is invalid", self.amount));
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(format!("distance_km {} is invalid", self.distance_km));
        }
        if self.duration_minutes < 0 {
            return Err(format!("duration_minutes {} is negative", self.duration_minutes));
        }

        Ok(())
    }

    /// Pickup and dropoff are practically the same point.
    pub fn is_circular(&self, radius_km: f64) -> bool {
        self.pickup.distance_km(&self.dropoff) < radius_km
    }
}
