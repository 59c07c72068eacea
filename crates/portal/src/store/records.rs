//! Persisted record shapes.
//!
//! Field names match what is stored (`camelCase`); conversion to and from
//! the untyped [`Fields`] map happens only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use clinic_portal_core::{BookingStatus, Email, PaymentStatus, Role, ServiceId, ServicePrice, UserId};

use super::{Fields, Record, StoreError};

/// User profile record, keyed by `uid` in the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileRecord {
    pub uid: UserId,
    pub email: Email,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Booking record in the `bookings` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_price: ServicePrice,
    pub date: DateTime<Utc>,
    pub time: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl UserProfileRecord {
    /// Encode as record fields.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if serialization fails.
    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        to_fields(self)
    }

    /// Decode from a stored record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the fields do not match the shape.
    pub fn from_record(record: &Record) -> Result<Self, StoreError> {
        from_record(record)
    }
}

impl BookingRecord {
    /// Encode as record fields.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if serialization fails.
    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        to_fields(self)
    }

    /// Decode from a stored record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the fields do not match the shape.
    pub fn from_record(record: &Record) -> Result<Self, StoreError> {
        from_record(record)
    }
}

fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::DataCorruption(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(StoreError::DataCorruption(e.to_string())),
    }
}

fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(record.fields.clone()))
        .map_err(|e| StoreError::DataCorruption(format!("record {}: {e}", record.id)))
}
