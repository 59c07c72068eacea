//! Booking commands: list and cancel.
//!
//! # Usage
//!
//! ```bash
//! portal-cli -f clinic.yaml bookings list -e mia@clinic.test -p secret1
//! portal-cli -f clinic.yaml bookings list -e mia@clinic.test -p secret1 --at 2026-12-01T00:00:00Z
//! portal-cli -f clinic.yaml bookings cancel -e mia@clinic.test -p secret1 bk-1
//! ```

use chrono::{DateTime, Utc};
use tracing::info;

use clinic_portal::Portal;
use clinic_portal_core::BookingId;

use super::{Credentials, print_json, sign_in};

/// Load the signed-in identity's bookings and print them as upcoming/past.
///
/// # Errors
///
/// Returns an error if sign-in, the load, or output fails.
pub async fn list(
    portal: &Portal,
    credentials: &Credentials,
    at: Option<DateTime<Utc>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let admission = sign_in(portal, credentials, None).await?;
    let mut manager = portal.bookings(&admission);
    let partition = manager.load(admission.user_id()).await?;

    let partition = match at {
        Some(now) => manager.partition_at(now),
        None => partition,
    };
    info!(
        upcoming = partition.upcoming.len(),
        past = partition.past.len(),
        "Bookings loaded"
    );
    print_json(&partition)
}

/// Cancel one booking, then print the updated partition.
///
/// # Errors
///
/// Returns an error if sign-in, the load, the cancel, or output fails.
pub async fn cancel(
    portal: &Portal,
    credentials: &Credentials,
    id: &BookingId,
) -> Result<(), Box<dyn std::error::Error>> {
    let admission = sign_in(portal, credentials, None).await?;
    let mut manager = portal.bookings(&admission);
    manager.load(admission.user_id()).await?;

    if !manager.bookings().iter().any(|booking| &booking.id == id) {
        return Err(format!("No booking {id} for {}", admission.identity().email).into());
    }

    manager.cancel(id).await?;
    print_json(&manager.partition())
}
