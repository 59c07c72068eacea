//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Credential operations (register, login, logout, reset, profile update)
//! - `bookings` - Booking lifecycle (load, classify, cancel)
//! - `reporting` - Admin dashboard aggregates

pub mod auth;
pub mod bookings;
pub mod reporting;

pub use auth::CredentialService;
pub use bookings::{BookingManager, MountHandle};
pub use reporting::{EntityCollections, ReportingSnapshot, compute_snapshot, load_snapshot};
