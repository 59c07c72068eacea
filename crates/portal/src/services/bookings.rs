//! Booking lifecycle.
//!
//! A [`BookingManager`] holds the bookings list of one view. Writes go to
//! the store first; the local list changes only after the write succeeded.
//! If the owning view unmounts while a load is in flight, the result is
//! dropped instead of applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use clinic_portal_core::{BookingId, BookingStatus, UserId};

use crate::error::{PortalError, Result};
use crate::models::{Booking, BookingPartition};
use crate::store::{DataStore, Fields, Filter, OrderBy, WriteMode, collections};

/// Mounted flag shared between a view and the manager it owns.
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Mark the view as gone; in-flight results will be discarded.
    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bookings list of one view, with load and cancel.
pub struct BookingManager {
    store: Arc<dyn DataStore>,
    bookings: Vec<Booking>,
    mount: MountHandle,
}

impl BookingManager {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            bookings: Vec::new(),
            mount: MountHandle::new(),
        }
    }

    /// Handle the owning view uses to signal unmount.
    #[must_use]
    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    /// The loaded bookings, newest first.
    #[must_use]
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// Classify the loaded bookings at the current instant.
    #[must_use]
    pub fn partition(&self) -> BookingPartition {
        self.partition_at(Utc::now())
    }

    #[must_use]
    pub fn partition_at(&self, now: DateTime<Utc>) -> BookingPartition {
        BookingPartition::at(&self.bookings, now)
    }

    /// Load every booking owned by `owner`, newest first, and classify them.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::FetchFailed` if the query fails; the current
    /// list is left untouched. Records that cannot be decoded are skipped. Returns
    /// `PortalError::Discarded` if the view unmounted while loading.
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn load(&mut self, owner: &UserId) -> Result<BookingPartition> {
        let records = self
            .store
            .query_collection(
                collections::BOOKINGS,
                &[Filter::eq("userId", owner.as_str())],
                Some(&OrderBy::desc("createdAt")),
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "Loading bookings failed");
                PortalError::FetchFailed(e)
            })?;

        if !self.mount.is_mounted() {
            debug!("View unmounted; discarding loaded bookings");
            return Err(PortalError::Discarded);
        }

        let bookings: Vec<Booking> = records
            .iter()
            .filter_map(|record| {
                Booking::from_record(record)
                    .inspect_err(|e| {
                        warn!(booking_id = %record.id, error = %e, "Skipping undecodable booking");
                    })
                    .ok()
            })
            .collect();

        debug!(count = bookings.len(), "Bookings loaded");
        self.bookings = bookings;
        Ok(self.partition())
    }

    /// Cancel a booking.
    ///
    /// Cancelling an already cancelled booking succeeds again.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::WriteFailed` if the store rejects the write
    /// (including a booking that does not exist); the list is left untouched.
    #[instrument(skip(self, id), fields(booking_id = %id))]
    pub async fn cancel(&mut self, id: &BookingId) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(BookingStatus::Cancelled.as_str()));

        self.store
            .put_record(collections::BOOKINGS, id.as_str(), fields, WriteMode::Update)
            .await
            .map_err(|e| {
                warn!(error = %e, "Cancelling booking failed");
                PortalError::WriteFailed(e)
            })?;

        if !self.mount.is_mounted() {
            debug!("View unmounted; cancel stored but list not updated");
            return Ok(());
        }

        for booking in self.bookings.iter_mut().filter(|b| &b.id == id) {
            booking.status = BookingStatus::Cancelled;
        }
        info!("Booking cancelled");
        Ok(())
    }
}
