//! In-memory adapters for the identity provider and data store ports.
//!
//! Used by tests, the CLI fixtures, and local development. Both support
//! one-shot failure injection so error paths can be exercised.

mod provider;
mod store;

pub use provider::{EmailKind, InMemoryIdentityProvider, ProviderOp, SentEmail};
pub use store::{InMemoryDataStore, StoreOp};
