//! YAML fixtures describing accounts, bookings and content.
//!
//! ```yaml
//! accounts:
//!   - email: admin@clinic.test
//!     password: secret1
//!     display_name: Admin
//!     role: admin
//! bookings:
//!   - id: bk-1
//!     owner: mia@clinic.test
//!     service_id: hydrafacial
//!     service_name: HydraFacial
//!     service_price: "120.00"
//!     date: 2026-11-02T10:00:00Z
//!     time: "10:00"
//!     status: confirmed
//!     payment_status: paid
//! services:
//!   - id: hydrafacial
//!     name: HydraFacial
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use clinic_portal::memory::{InMemoryDataStore, InMemoryIdentityProvider};
use clinic_portal::provider::ProviderError;
use clinic_portal::store::{BookingRecord, Fields, StoreError, UserProfileRecord, collections};
use clinic_portal_core::{
    BookingId, BookingStatus, Email, PaymentStatus, Role, ServiceId, ServicePrice, UserId,
};

/// Errors that can occur while loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid fixture: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Booking {booking} references unknown account {owner}")]
    UnknownOwner { booking: BookingId, owner: Email },

    #[error("Failed to encode fixture record: {0}")]
    Encode(#[from] StoreError),

    #[error("Failed to seed account: {0}")]
    Account(#[from] ProviderError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub accounts: Vec<FixtureAccount>,
    #[serde(default)]
    pub bookings: Vec<FixtureBooking>,
    #[serde(default)]
    pub services: Vec<FixtureEntity>,
    #[serde(default)]
    pub blogs: Vec<FixtureEntity>,
    #[serde(default)]
    pub faqs: Vec<FixtureEntity>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureAccount {
    pub email: Email,
    pub password: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Whether to write a profile record (omit to test role fallback).
    #[serde(default = "default_true")]
    pub profile: bool,
}

#[derive(Debug, Deserialize)]
pub struct FixtureBooking {
    pub id: BookingId,
    /// Owner account, by email.
    pub owner: Email,
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_price: ServicePrice,
    pub date: DateTime<Utc>,
    pub time: String,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// Untyped record for content collections.
#[derive(Debug, Deserialize)]
pub struct FixtureEntity {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

const fn default_true() -> bool {
    true
}

/// In-memory provider and store populated from a fixture.
pub struct World {
    pub provider: Arc<InMemoryIdentityProvider>,
    pub store: Arc<InMemoryDataStore>,
}

impl Fixture {
    /// Read and parse a fixture file.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::Read` or `FixtureError::Parse`.
    pub async fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FixtureError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content)
    }

    /// Parse fixture YAML.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::Parse` if the YAML does not match the shape.
    pub fn parse(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Populate an in-memory provider and store.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::UnknownOwner` if a booking names an account the
    /// fixture does not define, or `FixtureError::Account` if an account
    /// cannot be seeded.
    pub fn into_world(self) -> Result<World, FixtureError> {
        let provider = InMemoryIdentityProvider::new();
        let store = InMemoryDataStore::new();
        let mut owners: HashMap<Email, (UserId, String)> = HashMap::new();

        for account in self.accounts {
            let uid = provider.insert_account(
                &account.email,
                &account.password,
                account.display_name.as_deref(),
            )?;
            let display_name = account.display_name.unwrap_or_default();
            if account.profile {
                let profile = UserProfileRecord {
                    uid: uid.clone(),
                    email: account.email.clone(),
                    display_name: display_name.clone(),
                    role: account.role,
                    created_at: Utc::now(),
                };
                store.insert(collections::USERS, uid.as_str(), profile.to_fields()?);
            }
            owners.insert(account.email, (uid, display_name));
        }

        for booking in self.bookings {
            let Some((user_id, user_name)) = owners.get(&booking.owner) else {
                return Err(FixtureError::UnknownOwner {
                    booking: booking.id,
                    owner: booking.owner,
                });
            };
            let record = BookingRecord {
                user_id: user_id.clone(),
                user_name: user_name.clone(),
                user_email: booking.owner.to_string(),
                service_id: booking.service_id,
                service_name: booking.service_name,
                service_price: booking.service_price,
                date: booking.date,
                time: booking.time,
                status: booking.status,
                payment_status: booking.payment_status,
                created_at: booking.created_at.unwrap_or(booking.date),
            };
            store.insert(collections::BOOKINGS, booking.id.as_str(), record.to_fields()?);
        }

        for (collection, entities) in [
            (collections::SERVICES, self.services),
            (collections::BLOGS, self.blogs),
            (collections::FAQS, self.faqs),
        ] {
            for entity in entities {
                store.insert(collection, &entity.id, entity.fields);
            }
        }

        Ok(World {
            provider: Arc::new(provider),
            store: Arc::new(store),
        })
    }
}
