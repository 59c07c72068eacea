//! Clinic Portal Core - Shared types library.
//!
//! This crate provides the domain vocabulary shared by every portal component:
//! - `clinic-portal` - Session, credential, guard, booking and reporting core
//! - `clinic-portal-cli` - Fixture-driven command-line driver
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no identity provider access,
//! no data store clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, prices, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
