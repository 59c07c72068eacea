//! Domain models.

pub mod booking;

pub use booking::{Booking, BookingPartition};
