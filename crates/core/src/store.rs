//! Document-store collaborator.
//!
//! Handlers talk to persistent storage only through the [`Table`] trait: `get`, `put`,
//! conditional `put_unique`, `query` on a named secondary index, and `scan` with a filter
//! expression. Items are loosely-typed JSON objects so that records written by older versions
//! of the system (flat legacy shapes) can still be read and normalised.
//!
//! [`MemoryTable`] is the in-process implementation used by the server binary and the tests.
//! Each table is guarded by a single `RwLock`, so every individual call is atomic; sequences of
//! calls are not.

use crate::config::TableNames;
use crate::constants::DOCTOR_SLOT_INDEX;
use crate::events::EventSink;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A stored document.
pub type Item = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("item is missing key attribute '{0}'")]
    MissingKey(String),
    #[error("key attribute '{0}' must be a string")]
    InvalidKey(String),
    #[error("table '{table}' has no index named '{index}'")]
    UnknownIndex { table: String, index: String },
    #[error("conditional write failed on table '{0}'")]
    ConditionFailed(String),
    #[error("table '{0}' lock poisoned")]
    Poisoned(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Partition key and optional sort key attribute names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn composite(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: Some(sort_key.into()),
        }
    }
}

/// Primary key of a single item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key {
    pub partition: String,
    pub sort: Option<String>,
}

impl Key {
    pub fn partition(value: impl Into<String>) -> Self {
        Self {
            partition: value.into(),
            sort: None,
        }
    }

    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

/// Equality conditions on key attributes, all of which must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyCondition {
    terms: Vec<(String, Value)>,
}

impl KeyCondition {
    pub fn eq(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            terms: vec![(attr.into(), value.into())],
        }
    }

    pub fn and_eq(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((attr.into(), value.into()));
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.terms
            .iter()
            .all(|(attr, value)| item.get(attr) == Some(value))
    }
}

/// Scan filter expression over (possibly nested) item attributes.
///
/// Paths are dotted, e.g. `doctorProfile.city`.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq { path: String, value: Value },
    /// Substring match on a string attribute, or on the comma-joined string elements of a list.
    Contains { path: String, value: String },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn contains(path: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut terms) => {
                terms.push(other);
                Filter::And(terms)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Filter::Eq { path, value } => lookup(item, path) == Some(value),
            Filter::Contains { path, value } => match lookup(item, path) {
                Some(Value::String(s)) => s.contains(value.as_str()),
                Some(Value::Array(elements)) => elements
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
                    .contains(value.as_str()),
                _ => false,
            },
            Filter::And(terms) => terms.iter().all(|f| f.matches(item)),
        }
    }
}

fn lookup<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = item.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A key-value/document table.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &Key) -> StoreResult<Option<Item>>;

    /// Insert or replace an item.
    fn put(&self, item: Item) -> StoreResult<()>;

    /// Insert `item` only if no item in `index` matches `condition`.
    ///
    /// The check and the write happen as one step. Fails with
    /// [`StoreError::ConditionFailed`] when a match exists.
    fn put_unique(&self, item: Item, index: &str, condition: &KeyCondition) -> StoreResult<()>;

    /// Items in `index` matching `condition`, ordered by the index sort key.
    fn query(
        &self,
        index: &str,
        condition: &KeyCondition,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>>;

    /// Every item matching `filter`. Reads the whole table.
    fn scan(&self, filter: &Filter) -> StoreResult<Vec<Item>>;
}

type Slot = (String, String);

/// In-memory [`Table`].
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    schema: KeySchema,
    indexes: BTreeMap<String, KeySchema>,
    items: RwLock<BTreeMap<Slot, Item>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            schema,
            indexes: BTreeMap::new(),
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_index(mut self, name: impl Into<String>, schema: KeySchema) -> Self {
        self.indexes.insert(name.into(), schema);
        self
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_of(&self, item: &Item) -> StoreResult<Slot> {
        let partition = key_string(item, &self.schema.partition_key)?;
        let sort = match &self.schema.sort_key {
            Some(attr) => key_string(item, attr)?,
            None => String::new(),
        };
        Ok((partition, sort))
    }

    fn index(&self, name: &str) -> StoreResult<&KeySchema> {
        self.indexes.get(name).ok_or_else(|| StoreError::UnknownIndex {
            table: self.name.clone(),
            index: name.to_string(),
        })
    }

    fn poisoned(&self) -> StoreError {
        StoreError::Poisoned(self.name.clone())
    }
}

fn key_string(item: &Item, attr: &str) -> StoreResult<String> {
    match item.get(attr) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(StoreError::InvalidKey(attr.to_string())),
        None => Err(StoreError::MissingKey(attr.to_string())),
    }
}

fn in_index<'a>(
    items: &'a BTreeMap<Slot, Item>,
    schema: &'a KeySchema,
    condition: &'a KeyCondition,
) -> impl Iterator<Item = &'a Item> {
    // Sparse index: items without the index partition key are not part of it.
    items
        .values()
        .filter(move |item| item.contains_key(&schema.partition_key))
        .filter(move |item| condition.matches(item))
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &Key) -> StoreResult<Option<Item>> {
        let slot = (key.partition.clone(), key.sort.clone().unwrap_or_default());
        let items = self.items.read().map_err(|_| self.poisoned())?;
        Ok(items.get(&slot).cloned())
    }

    fn put(&self, item: Item) -> StoreResult<()> {
        let slot = self.slot_of(&item)?;
        let mut items = self.items.write().map_err(|_| self.poisoned())?;
        items.insert(slot, item);
        Ok(())
    }

    fn put_unique(&self, item: Item, index: &str, condition: &KeyCondition) -> StoreResult<()> {
        let schema = self.index(index)?;
        let slot = self.slot_of(&item)?;
        let mut items = self.items.write().map_err(|_| self.poisoned())?;
        if in_index(&items, schema, condition).next().is_some() {
            return Err(StoreError::ConditionFailed(self.name.clone()));
        }
        items.insert(slot, item);
        Ok(())
    }

    fn query(
        &self,
        index: &str,
        condition: &KeyCondition,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>> {
        let schema = self.index(index)?;
        let items = self.items.read().map_err(|_| self.poisoned())?;

        let mut matched: Vec<Item> = in_index(&items, schema, condition).cloned().collect();
        if let Some(sort_key) = &schema.sort_key {
            matched.sort_by(|a, b| {
                let a = a.get(sort_key).and_then(Value::as_str).unwrap_or("");
                let b = b.get(sort_key).and_then(Value::as_str).unwrap_or("");
                a.cmp(b)
            });
        }
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn scan(&self, filter: &Filter) -> StoreResult<Vec<Item>> {
        let items = self.items.read().map_err(|_| self.poisoned())?;
        Ok(items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }
}

/// Store handles injected into every handler, constructed once at startup.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Table>,
    pub appointments: Arc<dyn Table>,
    pub health_index: Arc<dyn Table>,
    pub events: Arc<dyn EventSink>,
}

impl Stores {
    /// In-memory tables laid out with the production key schemas.
    pub fn in_memory(tables: &TableNames, events: Arc<dyn EventSink>) -> Self {
        Self {
            users: Arc::new(users_table(&tables.users)),
            appointments: Arc::new(appointments_table(&tables.appointments)),
            health_index: Arc::new(health_index_table(&tables.health_index)),
            events,
        }
    }
}

/// Users, keyed by `userId`.
pub fn users_table(name: &str) -> MemoryTable {
    MemoryTable::new(name, KeySchema::partition("userId"))
}

/// Appointments, keyed by `appointmentId`, with the (`doctorId`, `slotISO`) index.
pub fn appointments_table(name: &str) -> MemoryTable {
    MemoryTable::new(name, KeySchema::partition("appointmentId"))
        .with_index(DOCTOR_SLOT_INDEX, KeySchema::composite("doctorId", "slotISO"))
}

/// Health-index snapshots, keyed by (`patientId`, `recordId`).
pub fn health_index_table(name: &str) -> MemoryTable {
    MemoryTable::new(name, KeySchema::composite("patientId", "recordId"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => panic!("test item must be an object"),
        }
    }

    #[test]
    fn put_then_get_by_partition_key() {
        let table = users_table("users");
        table.put(item(json!({"userId": "u1", "role": "DOCTOR"}))).unwrap();

        let found = table.get(&Key::partition("u1")).unwrap().unwrap();
        assert_eq!(found["role"], "DOCTOR");
        assert!(table.get(&Key::partition("u2")).unwrap().is_none());
    }

    #[test]
    fn composite_keys_keep_items_apart() {
        let table = health_index_table("hi");
        table
            .put(item(json!({"patientId": "p", "recordId": "a", "n": 1})))
            .unwrap();
        table
            .put(item(json!({"patientId": "p", "recordId": "latest", "n": 2})))
            .unwrap();

        assert_eq!(table.len(), 2);
        let latest = table.get(&Key::composite("p", "latest")).unwrap().unwrap();
        assert_eq!(latest["n"], 2);
    }

    #[test]
    fn put_requires_string_key() {
        let table = users_table("users");
        assert_eq!(
            table.put(item(json!({"email": "x"}))),
            Err(StoreError::MissingKey("userId".into()))
        );
        assert_eq!(
            table.put(item(json!({"userId": 7}))),
            Err(StoreError::InvalidKey("userId".into()))
        );
    }

    #[test]
    fn query_matches_index_condition_with_limit() {
        let table = appointments_table("appts");
        for (id, doctor, slot) in [("a1", "d1", "s2"), ("a2", "d1", "s1"), ("a3", "d2", "s1")] {
            table
                .put(item(json!({"appointmentId": id, "doctorId": doctor, "slotISO": slot})))
                .unwrap();
        }

        let all_d1 = table
            .query(DOCTOR_SLOT_INDEX, &KeyCondition::eq("doctorId", "d1"), None)
            .unwrap();
        assert_eq!(all_d1.len(), 2);
        assert_eq!(all_d1[0]["slotISO"], "s1");

        let one = table
            .query(
                DOCTOR_SLOT_INDEX,
                &KeyCondition::eq("doctorId", "d1").and_eq("slotISO", "s2"),
                Some(1),
            )
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0]["appointmentId"], "a1");
    }

    #[test]
    fn query_unknown_index_fails() {
        let table = users_table("users");
        let err = table
            .query("GSI9", &KeyCondition::eq("x", "y"), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownIndex { .. }));
    }

    #[test]
    fn put_unique_rejects_second_writer() {
        let table = appointments_table("appts");
        let cond = KeyCondition::eq("doctorId", "d1").and_eq("slotISO", "s1");

        table
            .put_unique(
                item(json!({"appointmentId": "a1", "doctorId": "d1", "slotISO": "s1"})),
                DOCTOR_SLOT_INDEX,
                &cond,
            )
            .unwrap();
        let second = table.put_unique(
            item(json!({"appointmentId": "a2", "doctorId": "d1", "slotISO": "s1"})),
            DOCTOR_SLOT_INDEX,
            &cond,
        );

        assert_eq!(second, Err(StoreError::ConditionFailed("appts".into())));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn scan_filters_nested_paths() {
        let table = users_table("users");
        table
            .put(item(json!({
                "userId": "d1",
                "role": "DOCTOR",
                "doctorProfile": {"city": "Lyon", "languages": ["English", "French"]}
            })))
            .unwrap();
        table
            .put(item(json!({
                "userId": "d2",
                "role": "DOCTOR",
                "doctorProfile": {"city": "Paris", "languages": "German"}
            })))
            .unwrap();
        table
            .put(item(json!({"userId": "p1", "role": "PATIENT"})))
            .unwrap();

        let lyon = Filter::eq("role", "DOCTOR").and(Filter::eq("doctorProfile.city", "Lyon"));
        let found = table.scan(&lyon).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["userId"], "d1");

        let french = table
            .scan(&Filter::contains("doctorProfile.languages", "French"))
            .unwrap();
        assert_eq!(found.len(), french.len());

        let german = table
            .scan(&Filter::contains("doctorProfile.languages", "Germ"))
            .unwrap();
        assert_eq!(german[0]["userId"], "d2");

        let doctors = table.scan(&Filter::eq("role", "DOCTOR")).unwrap();
        assert_eq!(doctors.len(), 2);
    }

    #[test]
    fn and_flattens() {
        let f = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));
        match f {
            Filter::And(terms) => assert_eq!(terms.len(), 3),
            _ => panic!("expected conjunction"),
        }
    }
}
