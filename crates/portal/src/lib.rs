//! Clinic Portal library.
//!
//! The session/authorization core and booking lifecycle of the clinic
//! booking portal, independent of any rendering layer.
//!
//! # Architecture
//!
//! - [`provider`] / [`store`] - ports to the external identity provider and data store
//! - [`session`] - process-wide session state fed by provider notifications
//! - [`services`] - credential operations, booking lifecycle and reporting
//! - [`guard`] - route admission state machine
//! - [`memory`] - in-memory adapters of both ports (tests, fixtures, CLI)
//! - [`state`] - the [`Portal`] handle wiring everything together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod guard;
pub mod memory;
pub mod models;
pub mod provider;
pub mod services;
pub mod session;
pub mod state;
pub mod store;

pub use config::PortalConfig;
pub use error::{PortalError, RegistrationStep, Result};
pub use guard::{AdmissionDecision, Denial, GuardState, RedirectTarget, RouteGuard};
pub use session::{Identity, Session, SessionStore, SessionSubscription};
pub use state::{Admission, Portal};
