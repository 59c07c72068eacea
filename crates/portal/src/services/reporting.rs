//! Admin dashboard aggregates.

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use clinic_portal_core::{PaymentStatus, ServicePrice};

use crate::error::{PortalError, Result};
use crate::store::{DataStore, Record, collections};

/// Raw entity collections. `None` and empty both count as zero.
#[derive(Debug, Clone, Default)]
pub struct EntityCollections {
    pub users: Option<Vec<Record>>,
    pub bookings: Option<Vec<Record>>,
    pub services: Option<Vec<Record>>,
    pub blogs: Option<Vec<Record>>,
    pub faqs: Option<Vec<Record>>,
}

/// Entity counts plus revenue from paid bookings. Recomputed per view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingSnapshot {
    pub users: usize,
    pub bookings: usize,
    pub services: usize,
    pub blogs: usize,
    pub faqs: usize,
    pub revenue: ServicePrice,
}

/// Compute the snapshot.
///
/// Revenue sums `servicePrice` over bookings whose `paymentStatus` is
/// `paid`; a missing or unreadable price counts as zero.
#[must_use]
pub fn compute_snapshot(collections: &EntityCollections) -> ReportingSnapshot {
    let count = |records: &Option<Vec<Record>>| records.as_ref().map_or(0, Vec::len);

    let revenue = collections
        .bookings
        .iter()
        .flatten()
        .filter(|record| record.str_field("paymentStatus") == Some(PaymentStatus::Paid.as_str()))
        .map(booking_price)
        .sum();

    ReportingSnapshot {
        users: count(&collections.users),
        bookings: count(&collections.bookings),
        services: count(&collections.services),
        blogs: count(&collections.blogs),
        faqs: count(&collections.faqs),
        revenue,
    }
}

fn booking_price(record: &Record) -> ServicePrice {
    record
        .fields
        .get("servicePrice")
        .filter(|value| !value.is_null())
        .and_then(|value| serde_json::from_value::<ServicePrice>(Value::clone(value)).ok())
        .unwrap_or(ServicePrice::ZERO)
}

/// Fetch the five entity collections and compute the snapshot.
///
/// # Errors
///
/// Returns `PortalError::FetchFailed` if any collection cannot be read.
#[instrument(skip(store))]
pub async fn load_snapshot(store: &dyn DataStore) -> Result<ReportingSnapshot> {
    let fetch = |name: &'static str| async move {
        store
            .count_collection(name)
            .await
            .map(Some)
            .map_err(|e| {
                tracing::warn!(collection = name, error = %e, "Fetching collection failed");
                PortalError::FetchFailed(e)
            })
    };

    let collections = EntityCollections {
        users: fetch(collections::USERS).await?,
        bookings: fetch(collections::BOOKINGS).await?,
        services: fetch(collections::SERVICES).await?,
        blogs: fetch(collections::BLOGS).await?,
        faqs: fetch(collections::FAQS).await?,
    };
    Ok(compute_snapshot(&collections))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::memory::{InMemoryDataStore, StoreOp};
    use crate::store::{Fields, StoreError};

    fn record(id: &str, value: Value) -> Record {
        let fields = match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        Record::new(id, fields)
    }

    #[test]
    fn test_revenue_counts_paid_only() {
        let collections = EntityCollections {
            bookings: Some(vec![
                record("a", json!({"paymentStatus": "paid", "servicePrice": 100})),
                record("b", json!({"paymentStatus": "unpaid", "servicePrice": 50})),
            ]),
            ..Default::default()
        };

        let snapshot = compute_snapshot(&collections);
        assert_eq!(snapshot.revenue, ServicePrice::from_units(100));
        assert_eq!(snapshot.bookings, 2);
    }

    #[test]
    fn test_missing_collections_count_zero() {
        let snapshot = compute_snapshot(&EntityCollections {
            users: Some(Vec::new()),
            ..Default::default()
        });
        assert_eq!(
            snapshot,
            ReportingSnapshot {
                users: 0,
                bookings: 0,
                services: 0,
                blogs: 0,
                faqs: 0,
                revenue: ServicePrice::ZERO,
            }
        );
    }

    #[test]
    fn test_bad_prices_count_zero() {
        let collections = EntityCollections {
            bookings: Some(vec![
                record("a", json!({"paymentStatus": "paid"})),
                record("b", json!({"paymentStatus": "paid", "servicePrice": null})),
                record("c", json!({"paymentStatus": "paid", "servicePrice": "abc"})),
                record("d", json!({"paymentStatus": "paid", "servicePrice": -20})),
                record("e", json!({"paymentStatus": "paid", "servicePrice": "49.50"})),
            ]),
            ..Default::default()
        };

        let snapshot = compute_snapshot(&collections);
        assert_eq!(snapshot.revenue.amount(), Decimal::new(4950, 2));
    }

    #[tokio::test]
    async fn test_load_snapshot_from_store() {
        let store = InMemoryDataStore::new();
        store.insert(collections::USERS, "u1", Fields::new());
        store.insert(collections::USERS, "u2", Fields::new());
        store.insert(collections::FAQS, "f1", Fields::new());
        store.insert(
            collections::BOOKINGS,
            "b1",
            record("b1", json!({"paymentStatus": "paid", "servicePrice": "120"})).fields,
        );

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.users, 2);
        assert_eq!(snapshot.faqs, 1);
        assert_eq!(snapshot.services, 0);
        assert_eq!(snapshot.revenue, ServicePrice::from_units(120));
    }

    #[tokio::test]
    async fn test_load_snapshot_surfaces_fetch_failure() {
        let store = InMemoryDataStore::new();
        store.fail_next(StoreOp::Count, StoreError::Unavailable("offline".into()));

        let err = load_snapshot(&store).await.unwrap_err();
        assert!(matches!(err, PortalError::FetchFailed(_)));
    }
}
