//! # Lazy Accessors
//!
//! A resource's fields are not struct members. Each one is an [`Accessor`]: a getter and
//! setter pair over the resource's [`DataStore`], translating between the raw JSON blob
//! and typed [`FieldValue`]s with the field's compiled serialize/deserialize functions.
//!
//! Accessors know nothing about fetching. A read that finds no value at the storage key
//! answers `None`, and the owner ([`Resource::get`](crate::framework::Resource::get))
//! decides to fetch. That keeps this layer testable with nothing but a `DataStore`.
//!
//! Host reactive systems hook in through [`DataStore::subscribe`]: its version bumps on
//! every write or replacement, which is the signal to recompute accessor values.

use crate::schema::{FieldDescriptor, FieldValue, Schema, SchemaError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// The JSON backing store of one resource.
#[derive(Debug)]
pub struct DataStore {
    data: Mutex<Option<Value>>,
    version: watch::Sender<u64>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DataStore {
    pub fn new(data: Option<Value>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: Mutex::new(data),
            version,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.lock().clone()
    }

    /// Value at `key`, which may be a dotted path into nested objects.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.lock().as_ref().and_then(|data| get_path(data, key)).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().as_ref().is_some_and(|data| get_path(data, key).is_some())
    }

    /// Writes `value` at `key`, creating intermediate objects as needed.
    pub fn write(&self, key: &str, value: Value) {
        {
            let mut data = self.lock();
            let root = data.get_or_insert_with(|| Value::Object(Map::new()));
            set_path(root, key, value);
        }
        self.bump();
    }

    /// Swaps in a whole new blob.
    pub fn replace(&self, data: Option<Value>) {
        *self.lock() = data;
        self.bump();
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

fn get_path<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(data, |node, segment| node.as_object()?.get(segment))
}

fn set_path(root: &mut Value, key: &str, value: Value) {
    let mut node = root;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Getter/setter pair for one compiled field.
#[derive(Debug, Clone)]
pub struct Accessor {
    descriptor: Arc<FieldDescriptor>,
}

impl Accessor {
    pub fn new(descriptor: Arc<FieldDescriptor>) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Reads the field. `Ok(None)` means the store lacks the storage key and the
    /// owner has to fetch before the value can exist.
    pub fn get(&self, store: &DataStore) -> Result<Option<FieldValue>, SchemaError> {
        // Deserializing may create associated resources; do it outside the store lock.
        match store.lookup(self.descriptor.storage_key()) {
            Some(raw) => self.descriptor.deserialize(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Writes `serialize(value)` at the storage key and hands `value` back.
    pub fn set(&self, store: &DataStore, value: FieldValue) -> Result<FieldValue, SchemaError> {
        let json = self.descriptor.serialize(&value)?;
        store.write(self.descriptor.storage_key(), json);
        Ok(value)
    }
}

/// One accessor per compiled field.
pub fn build_accessors(schema: &Schema) -> BTreeMap<String, Accessor> {
    schema
        .iter()
        .map(|descriptor| (descriptor.name().to_string(), Accessor::new(descriptor.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{compile, FieldDef};
    use serde_json::json;

    fn accessors() -> BTreeMap<String, Accessor> {
        let raw = [
            ("name".to_string(), FieldDef::string()),
            ("title".to_string(), FieldDef::string().key("meta.title")),
            ("active".to_string(), FieldDef::boolean()),
        ]
        .into_iter()
        .collect();
        build_accessors(&compile(raw, None).unwrap())
    }

    #[test]
    fn test_missing_key_reads_none() {
        let accessors = accessors();
        let store = DataStore::new(Some(json!({"name": "Ada"})));
        assert_eq!(accessors["active"].get(&store).unwrap(), None);
        assert_eq!(DataStore::default().snapshot(), None);
        assert_eq!(accessors["name"].get(&DataStore::default()).unwrap(), None);
    }

    #[test]
    fn test_present_key_is_deserialized() {
        let accessors = accessors();
        let store = DataStore::new(Some(json!({"name": 42, "active": "true"})));
        assert_eq!(
            accessors["name"].get(&store).unwrap(),
            Some(FieldValue::String("42".into()))
        );
        assert_eq!(
            accessors["active"].get(&store).unwrap(),
            Some(FieldValue::Boolean(true))
        );
    }

    #[test]
    fn test_set_writes_serialized_value_and_returns_input() {
        let accessors = accessors();
        let store = DataStore::default();
        let written = accessors["active"].set(&store, "true".into()).unwrap();
        assert_eq!(written, FieldValue::String("true".into()));
        assert_eq!(store.snapshot(), Some(json!({"active": true})));
    }

    #[test]
    fn test_dotted_keys_address_nested_objects() {
        let accessors = accessors();
        let store = DataStore::new(Some(json!({"meta": 3})));
        accessors["title"].set(&store, "Dune".into()).unwrap();
        assert_eq!(store.snapshot(), Some(json!({"meta": {"title": "Dune"}})));
        assert_eq!(
            accessors["title"].get(&store).unwrap(),
            Some(FieldValue::String("Dune".into()))
        );
        assert!(store.contains("meta.title"));
        assert!(!store.contains("meta.subtitle"));
    }

    #[test]
    fn test_writes_bump_version() {
        let store = DataStore::default();
        let watcher = store.subscribe();
        store.write("a", json!(1));
        store.replace(Some(json!({})));
        assert_eq!(store.version(), 2);
        assert!(watcher.has_changed().unwrap());
    }
}
