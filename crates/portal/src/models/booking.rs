//! Booking domain type and the upcoming/past classification.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clinic_portal_core::{BookingId, BookingStatus, PaymentStatus, ServiceId, ServicePrice, UserId};

use crate::store::{BookingRecord, Record, StoreError};

/// An appointment (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    /// Identity that owns the booking.
    pub owner_id: UserId,
    pub owner_name: String,
    pub owner_email: String,
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_price: ServicePrice,
    /// Appointment instant.
    pub date: DateTime<Utc>,
    /// Slot label as chosen in the booking form (e.g. "14:00").
    pub time: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Decode a stored booking record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the record has the wrong shape.
    pub fn from_record(record: &Record) -> Result<Self, StoreError> {
        let stored = BookingRecord::from_record(record)?;
        Ok(Self {
            id: BookingId::new(record.id.clone()),
            owner_id: stored.user_id,
            owner_name: stored.user_name,
            owner_email: stored.user_email,
            service_id: stored.service_id,
            service_name: stored.service_name,
            service_price: stored.service_price,
            date: stored.date,
            time: stored.time,
            status: stored.status,
            payment_status: stored.payment_status,
            created_at: stored.created_at,
        })
    }

    /// The stored shape of this booking (without its ID).
    #[must_use]
    pub fn to_record(&self) -> BookingRecord {
        BookingRecord {
            user_id: self.owner_id.clone(),
            user_name: self.owner_name.clone(),
            user_email: self.owner_email.clone(),
            service_id: self.service_id.clone(),
            service_name: self.service_name.clone(),
            service_price: self.service_price,
            date: self.date,
            time: self.time.clone(),
            status: self.status,
            payment_status: self.payment_status,
            created_at: self.created_at,
        }
    }

    /// Open (pending or confirmed) and not yet in the past.
    ///
    /// An appointment at exactly `now` still counts as upcoming.
    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.date >= now
    }

    #[must_use]
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        !self.is_upcoming(now)
    }
}

/// Bookings split into upcoming and past at a given instant.
///
/// Both halves keep the input order. Never cache one of these across time:
/// an upcoming booking silently becomes past once its date goes by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookingPartition {
    pub upcoming: Vec<Booking>,
    pub past: Vec<Booking>,
}

impl BookingPartition {
    /// Classify `bookings` at `now`.
    #[must_use]
    pub fn at(bookings: &[Booking], now: DateTime<Utc>) -> Self {
        let (upcoming, past) = bookings
            .iter()
            .cloned()
            .partition(|booking| booking.is_upcoming(now));
        Self { upcoming, past }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.upcoming.len() + self.past.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty() && self.past.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Duration;

    use super::*;

    pub(crate) fn booking(id: &str, status: BookingStatus, date: DateTime<Utc>) -> Booking {
        Booking {
            id: BookingId::new(id),
            owner_id: UserId::new("owner"),
            owner_name: "Owner".into(),
            owner_email: "owner@example.com".into(),
            service_id: ServiceId::new("peel"),
            service_name: "Chemical Peel".into(),
            service_price: ServicePrice::from_units(80),
            date,
            time: "09:00".into(),
            status,
            payment_status: PaymentStatus::Unpaid,
            created_at: date - Duration::days(7),
        }
    }

    #[test]
    fn test_open_future_booking_is_upcoming() {
        let now = Utc::now();
        let b = booking("1", BookingStatus::Pending, now + Duration::hours(1));
        assert!(b.is_upcoming(now));
        assert!(!b.is_past(now));
    }

    #[test]
    fn test_booking_at_now_is_upcoming() {
        let now = Utc::now();
        assert!(booking("1", BookingStatus::Confirmed, now).is_upcoming(now));
    }

    #[test]
    fn test_closed_statuses_are_past_even_in_future() {
        let now = Utc::now();
        let tomorrow = now + Duration::days(1);
        assert!(booking("1", BookingStatus::Cancelled, tomorrow).is_past(now));
        assert!(booking("2", BookingStatus::Completed, tomorrow).is_past(now));
    }

    #[test]
    fn test_open_booking_in_past_is_past() {
        let now = Utc::now();
        assert!(booking("1", BookingStatus::Confirmed, now - Duration::minutes(1)).is_past(now));
    }

    #[test]
    fn test_partition_is_disjoint_exhaustive_and_ordered() {
        let now = Utc::now();
        let list = vec![
            booking("a", BookingStatus::Confirmed, now + Duration::days(1)),
            booking("b", BookingStatus::Completed, now - Duration::days(1)),
            booking("c", BookingStatus::Cancelled, now + Duration::days(1)),
            booking("d", BookingStatus::Pending, now + Duration::days(3)),
        ];

        let partition = BookingPartition::at(&list, now);
        let upcoming: Vec<_> = partition.upcoming.iter().map(|b| b.id.as_str()).collect();
        let past: Vec<_> = partition.past.iter().map(|b| b.id.as_str()).collect();

        assert_eq!(upcoming, ["a", "d"]);
        assert_eq!(past, ["b", "c"]);
        assert_eq!(partition.len(), list.len());
    }

    #[test]
    fn test_partition_moves_with_the_clock() {
        let now = Utc::now();
        let list = vec![booking("a", BookingStatus::Confirmed, now + Duration::hours(2))];

        assert_eq!(BookingPartition::at(&list, now).upcoming.len(), 1);
        assert_eq!(BookingPartition::at(&list, now + Duration::hours(3)).past.len(), 1);
    }

    #[test]
    fn test_record_round_trip_keeps_id_out_of_fields() {
        let now = Utc::now();
        let original = booking("bk-7", BookingStatus::Pending, now);
        let fields = original.to_record().to_fields().unwrap();
        assert!(!fields.contains_key("id"));

        let decoded = Booking::from_record(&Record::new("bk-7", fields)).unwrap();
        assert_eq!(decoded, original);
    }
}
