//! In-memory document store.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::store::{DataStore, Direction, Fields, Filter, OrderBy, Record, StoreError, WriteMode};

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    Query,
    Count,
}

#[derive(Debug, Default)]
struct StoreState {
    /// collection -> id -> fields
    collections: HashMap<String, BTreeMap<String, Fields>>,
    failures: HashMap<StoreOp, StoreError>,
    get_delays: HashMap<String, Duration>,
}

impl StoreState {
    fn take_failure(&mut self, op: StoreOp) -> Result<(), StoreError> {
        self.failures.remove(&op).map_or(Ok(()), Err)
    }

    fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, fields)| Record::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Data store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    state: Mutex<StoreState>,
}

impl InMemoryDataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record directly.
    pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Read a record directly.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<Fields> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
    }

    /// Number of records in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.lock().failures.insert(op, err);
    }

    /// Delay every `get_record` for record `id` by `delay`.
    pub fn set_get_delay(&self, id: &str, delay: Duration) {
        self.lock().get_delays.insert(id.to_string(), delay);
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let delay = {
            let mut state = self.lock();
            state.take_failure(StoreOp::Get)?;
            state.get_delays.get(id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.get(collection, id).map(|fields| Record::new(id, fields)))
    }

    async fn put_record(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.take_failure(StoreOp::Put)?;
        let records = state.collections.entry(collection.to_string()).or_default();
        match mode {
            WriteMode::Replace => {
                records.insert(id.to_string(), fields);
            }
            WriteMode::Merge => {
                records.entry(id.to_string()).or_default().extend(fields);
            }
            WriteMode::Update => {
                let existing = records.get_mut(id).ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
                existing.extend(fields);
            }
        }
        Ok(())
    }

    async fn query_collection(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut records = {
            let mut state = self.lock();
            state.take_failure(StoreOp::Query)?;
            state.records(collection)
        };
        records.retain(|record| filters.iter().all(|filter| matches(record, filter)));
        if let Some(order) = order_by {
            let kind = ColumnKind::of(records.iter().filter_map(|r| r.fields.get(&order.field)));
            records.sort_by(|a, b| {
                let ordering =
                    compare_values(kind, a.fields.get(&order.field), b.fields.get(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        Ok(records)
    }

    async fn count_collection(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let mut state = self.lock();
        state.take_failure(StoreOp::Count)?;
        Ok(state.records(collection))
    }
}

fn matches(record: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { field, value } => record.fields.get(field) == Some(value),
    }
}

/// How a sort column compares its values.
///
/// Picked once per query so every pair compares the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Every value is an RFC 3339 instant.
    Instant,
    /// Every value is a number.
    Number,
    /// Anything else compares by its string form.
    Text,
}

impl ColumnKind {
    fn of<'a>(values: impl Iterator<Item = &'a Value> + Clone) -> Self {
        if values.clone().all(|v| as_instant(v).is_some()) {
            Self::Instant
        } else if values.clone().all(Value::is_number) {
            Self::Number
        } else {
            Self::Text
        }
    }
}

fn as_instant(value: &Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn text_key(value: &Value) -> Cow<'_, str> {
    value
        .as_str()
        .map_or_else(|| Cow::Owned(value.to_string()), Cow::Borrowed)
}

/// Order field values: missing first, then by the column's kind.
fn compare_values(kind: ColumnKind, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };
    match kind {
        ColumnKind::Instant => as_instant(a).cmp(&as_instant(b)),
        ColumnKind::Number => {
            let number = |v: &Value| v.as_f64().unwrap_or(f64::NAN);
            number(a).total_cmp(&number(b))
        }
        ColumnKind::Text => text_key(a).cmp(&text_key(b)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let store = InMemoryDataStore::new();
        store.insert("users", "u1", fields(json!({"displayName": "Old", "role": "admin"})));

        store
            .put_record("users", "u1", fields(json!({"displayName": "New"})), WriteMode::Merge)
            .await
            .unwrap();

        let record = store.get("users", "u1").unwrap();
        assert_eq!(record.get("displayName"), Some(&json!("New")));
        assert_eq!(record.get("role"), Some(&json!("admin")));
    }

    #[tokio::test]
    async fn test_replace_drops_other_fields() {
        let store = InMemoryDataStore::new();
        store.insert("users", "u1", fields(json!({"displayName": "Old", "role": "admin"})));

        store
            .put_record("users", "u1", fields(json!({"displayName": "New"})), WriteMode::Replace)
            .await
            .unwrap();

        assert!(!store.get("users", "u1").unwrap().contains_key("role"));
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = InMemoryDataStore::new();
        let err = store
            .put_record("bookings", "missing", fields(json!({"status": "cancelled"})), WriteMode::Update)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.len("bookings"), 0);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders_by_instant() {
        let store = InMemoryDataStore::new();
        store.insert("bookings", "a", fields(json!({"userId": "u1", "createdAt": "2026-01-02T00:00:00Z"})));
        store.insert("bookings", "b", fields(json!({"userId": "u2", "createdAt": "2026-01-03T00:00:00Z"})));
        store.insert("bookings", "c", fields(json!({"userId": "u1", "createdAt": "2026-01-05T09:30:00+02:00"})));

        let records = store
            .query_collection("bookings", &[Filter::eq("userId", "u1")], Some(&OrderBy::desc("createdAt")))
            .await
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[tokio::test]
    async fn test_query_orders_numbers_numerically() {
        let store = InMemoryDataStore::new();
        store.insert("services", "x", fields(json!({"price": 100})));
        store.insert("services", "y", fields(json!({"price": 20})));
        store.insert("services", "z", fields(json!({})));

        let records = store
            .query_collection("services", &[], Some(&OrderBy::asc("price")))
            .await
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["z", "y", "x"]);
    }

    #[tokio::test]
    async fn test_query_mixed_column_orders_as_text() {
        let store = InMemoryDataStore::new();
        store.insert("bookings", "a", fields(json!({"createdAt": "2026-01-01T10:00:00+02:00"})));
        store.insert("bookings", "b", fields(json!({"createdAt": "2026-01-01T09:00:00Z"})));
        store.insert("bookings", "c", fields(json!({"createdAt": "legacy"})));
        store.insert("bookings", "d", fields(json!({"createdAt": "2026-01-01T08:30:00Z"})));
        store.insert("bookings", "e", fields(json!({"createdAt": 7})));

        let records = store
            .query_collection("bookings", &[], Some(&OrderBy::asc("createdAt")))
            .await
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["d", "b", "a", "e", "c"]);
    }

    #[test]
    fn test_column_kind_requires_every_value() {
        let instants = [json!("2026-01-01T10:00:00+02:00"), json!("2026-01-01T09:00:00Z")];
        assert_eq!(ColumnKind::of(instants.iter()), ColumnKind::Instant);
        // 10:00+02:00 is 08:00Z, before 09:00Z.
        assert_eq!(
            compare_values(ColumnKind::Instant, instants.first(), instants.last()),
            Ordering::Less
        );

        let mixed = [json!("2026-01-01T09:00:00Z"), json!("legacy")];
        assert_eq!(ColumnKind::of(mixed.iter()), ColumnKind::Text);
        assert_eq!(ColumnKind::of([json!(1), json!(2.5)].iter()), ColumnKind::Number);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let store = InMemoryDataStore::new();
        store.fail_next(StoreOp::Count, StoreError::Unavailable("offline".into()));

        assert!(store.count_collection("faqs").await.is_err());
        assert!(store.count_collection("faqs").await.unwrap().is_empty());
    }
}
