//! Data store port.
//!
//! The portal talks to a document store: named collections of records, each
//! record a flat JSON object keyed by a string ID. Only the operations the
//! core needs are part of the contract.

pub mod records;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use records::{BookingRecord, UserProfileRecord};

/// Collection names used by the portal.
pub mod collections {
    /// User profile records keyed by provider uid.
    pub const USERS: &str = "users";

    /// Booking records.
    pub const BOOKINGS: &str = "bookings";

    /// Clinic service catalogue.
    pub const SERVICES: &str = "services";

    /// Blog posts.
    pub const BLOGS: &str = "blogs";

    /// Frequently asked questions.
    pub const FAQS: &str = "faqs";
}

/// Record field values.
pub type Fields = Map<String, Value>;

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// String value of a field, if present and a string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Query filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq { field: String, value: Value },
}

impl Filter {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }
}

/// How `put_record` treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the whole record, creating it if missing.
    Replace,
    /// Overwrite only the given fields, creating the record if missing.
    Merge,
    /// Overwrite only the given fields; fail if the record does not exist.
    Update,
}

/// Errors that can occur during data store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport or backend failure.
    #[error("data store unavailable: {0}")]
    Unavailable(String),

    /// `WriteMode::Update` targeted a record that does not exist.
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A record could not be decoded into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Operations consumed from the data store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch a single record by ID.
    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Write a record.
    async fn put_record(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Fetch the records matching all `filters`, optionally ordered.
    async fn query_collection(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Fetch every record of a collection, for counting and aggregation.
    async fn count_collection(&self, collection: &str) -> Result<Vec<Record>, StoreError>;
}
