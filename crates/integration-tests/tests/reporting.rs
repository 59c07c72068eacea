//! Admin dashboard snapshot.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use clinic_portal::PortalError;
use clinic_portal::memory::StoreOp;
use clinic_portal::services::{EntityCollections, compute_snapshot};
use clinic_portal::store::{Fields, Record, StoreError, collections};
use clinic_portal_core::{BookingStatus, PaymentStatus, Role, ServicePrice};
use clinic_portal_integration_tests::TestContext;

fn entity(id: &str, title: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("id".into(), json!(id));
    fields.insert("title".into(), json!(title));
    fields
}

#[tokio::test]
async fn test_snapshot_counts_and_paid_revenue() {
    let ctx = TestContext::new();
    let admin = ctx.add_account("admin@clinic.test", "secret1", Some(Role::Admin));
    let tomorrow = Utc::now() + Duration::days(1);
    ctx.add_booking(
        "bk-paid",
        &admin,
        BookingStatus::Completed,
        PaymentStatus::Paid,
        tomorrow,
        100,
    );
    ctx.add_booking(
        "bk-unpaid",
        &admin,
        BookingStatus::Confirmed,
        PaymentStatus::Unpaid,
        tomorrow,
        50,
    );
    ctx.store
        .insert(collections::SERVICES, "hydrafacial", entity("hydrafacial", "HydraFacial"));
    ctx.store
        .insert(collections::FAQS, "faq-1", entity("faq-1", "Opening hours"));

    ctx.sign_in("admin@clinic.test", "secret1").await;
    let admission = ctx.portal.admit(Some(Role::Admin)).await.unwrap();
    let snapshot = ctx.portal.snapshot(&admission).await.unwrap();

    assert_eq!(snapshot.users, 1);
    assert_eq!(snapshot.bookings, 2);
    assert_eq!(snapshot.services, 1);
    assert_eq!(snapshot.blogs, 0);
    assert_eq!(snapshot.faqs, 1);
    assert_eq!(snapshot.revenue, ServicePrice::from_units(100));
}

#[tokio::test]
async fn test_snapshot_of_empty_store_is_zero() {
    let ctx = TestContext::new();
    let _ = ctx.add_account("admin@clinic.test", "secret1", Some(Role::Admin));
    ctx.sign_in("admin@clinic.test", "secret1").await;

    let admission = ctx.portal.admit(Some(Role::Admin)).await.unwrap();
    let snapshot = ctx.portal.snapshot(&admission).await.unwrap();
    assert_eq!(snapshot.bookings, 0);
    assert_eq!(snapshot.revenue, ServicePrice::ZERO);
}

#[tokio::test]
async fn test_snapshot_requires_admin() {
    let ctx = TestContext::new();
    let _ = ctx.add_account("mia@clinic.test", "secret1", Some(Role::User));
    ctx.sign_in("mia@clinic.test", "secret1").await;

    let admission = ctx.portal.admit(Some(Role::User)).await.unwrap();
    let err = ctx.portal.snapshot(&admission).await.unwrap_err();
    assert!(matches!(
        err,
        PortalError::PermissionDenied {
            required: Role::Admin,
            actual: Role::User,
        }
    ));
}

#[tokio::test]
async fn test_snapshot_fetch_failure_surfaces() {
    let ctx = TestContext::new();
    let _ = ctx.add_account("admin@clinic.test", "secret1", Some(Role::Admin));
    ctx.sign_in("admin@clinic.test", "secret1").await;
    let admission = ctx.portal.admit(Some(Role::Admin)).await.unwrap();

    ctx.store
        .fail_next(StoreOp::Count, StoreError::Unavailable("offline".into()));
    let err = ctx.portal.snapshot(&admission).await.unwrap_err();
    assert!(matches!(err, PortalError::FetchFailed(_)));

    // A retry by the caller succeeds.
    assert!(ctx.portal.snapshot(&admission).await.is_ok());
}

#[test]
fn test_compute_snapshot_ignores_unreadable_prices() {
    let booking = |id: &str, paid: &str, price: serde_json::Value| {
        let mut fields = Fields::new();
        fields.insert("paymentStatus".into(), json!(paid));
        fields.insert("servicePrice".into(), price);
        Record {
            id: id.to_string(),
            fields,
        }
    };
    let collections = EntityCollections {
        bookings: Some(vec![
            booking("a", "paid", json!("19.50")),
            booking("b", "paid", json!("30")),
            booking("c", "paid", json!("not a price")),
            booking("d", "paid", serde_json::Value::Null),
            booking("e", "unpaid", json!("500")),
        ]),
        ..EntityCollections::default()
    };

    let snapshot = compute_snapshot(&collections);
    assert_eq!(snapshot.bookings, 5);
    assert_eq!(snapshot.users, 0);
    assert_eq!(snapshot.revenue.amount(), Decimal::new(4950, 2));
}
