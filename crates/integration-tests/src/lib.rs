//! Integration tests for the clinic portal core.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p clinic-portal-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_resolution` - Session store driven by provider notifications
//! - `route_guard` - Admission decisions and redirects
//! - `booking_lifecycle` - Load, classify and cancel
//! - `registration` - Credential flows end to end
//! - `reporting` - Admin snapshot
//!
//! Everything runs against the in-memory provider and store; no external
//! services are needed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use clinic_portal::memory::{InMemoryDataStore, InMemoryIdentityProvider};
use clinic_portal::store::{BookingRecord, Fields, collections};
use clinic_portal::{Portal, PortalConfig, Session};
use clinic_portal_core::{
    BookingId, BookingStatus, Email, PaymentStatus, Role, ServiceId, ServicePrice, UserId,
};

/// A started portal over fresh in-memory adapters.
pub struct TestContext {
    pub provider: Arc<InMemoryIdentityProvider>,
    pub store: Arc<InMemoryDataStore>,
    pub portal: Portal,
}

impl TestContext {
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PortalConfig::default())
    }

    #[must_use]
    pub fn with_config(config: PortalConfig) -> Self {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryDataStore::new());
        let portal = Portal::start(config, provider.clone(), store.clone());
        Self {
            provider,
            store,
            portal,
        }
    }

    /// Seed an account; `role: None` leaves it without a profile record.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address or the account cannot be seeded.
    #[must_use]
    pub fn add_account(&self, email: &str, password: &str, role: Option<Role>) -> UserId {
        let email = parse_email(email);
        let uid = match self.provider.insert_account(&email, password, None) {
            Ok(uid) => uid,
            Err(e) => panic!("account {email} could not be seeded: {e}"),
        };
        if let Some(role) = role {
            let mut profile = Fields::new();
            profile.insert("uid".into(), json!(uid.as_str()));
            profile.insert("email".into(), json!(email.as_str()));
            profile.insert("role".into(), json!(role.as_str()));
            self.store.insert(collections::USERS, uid.as_str(), profile);
        }
        uid
    }

    /// Seed a booking owned by `owner`.
    ///
    /// # Panics
    ///
    /// Panics if the booking cannot be encoded.
    pub fn add_booking(
        &self,
        id: &str,
        owner: &UserId,
        status: BookingStatus,
        payment_status: PaymentStatus,
        date: DateTime<Utc>,
        price: u32,
    ) {
        let record = BookingRecord {
            user_id: owner.clone(),
            user_name: "Patient".into(),
            user_email: "patient@clinic.test".into(),
            service_id: ServiceId::new("hydrafacial"),
            service_name: "HydraFacial".into(),
            service_price: ServicePrice::from_units(price),
            date,
            time: "10:00".into(),
            status,
            payment_status,
            created_at: date - Duration::days(14),
        };
        let fields = match record.to_fields() {
            Ok(fields) => fields,
            Err(e) => panic!("booking {id} could not be encoded: {e}"),
        };
        self.store.insert(collections::BOOKINGS, id, fields);
    }

    /// Sign in and wait until the session shows the identity.
    ///
    /// # Panics
    ///
    /// Panics if the login is rejected or the session never catches up.
    pub async fn sign_in(&self, email: &str, password: &str) -> Session {
        self.portal.sessions().wait_resolved().await;
        if let Err(e) = self.portal.credentials().login(email, password).await {
            panic!("login as {email} failed: {e}");
        }
        let expected = parse_email(email);
        let session = self
            .portal
            .on_session_change()
            .wait_for(|s| s.identity().is_some_and(|i| i.email == expected))
            .await;
        match session {
            Some(session) => session,
            None => panic!("session store stopped before {email} signed in"),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Booking ID helper.
#[must_use]
pub fn booking_id(id: &str) -> BookingId {
    BookingId::new(id)
}

fn parse_email(email: &str) -> Email {
    match Email::parse(email) {
        Ok(email) => email,
        Err(e) => panic!("invalid test email {email}: {e}"),
    }
}
