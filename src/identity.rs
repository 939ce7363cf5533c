//! # Identity Map
//!
//! One map per resource class, guaranteeing at most one live [`Resource`] per id.
//! The table is created on the first id-bearing `create`, entries are inserted once and
//! never evicted. A later `create` with the same id returns the cached instance as is;
//! the new options are discarded, not merged.

use crate::framework::Resource;
use crate::schema::format_json_number;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Normalizes an id to its string form. `null`, `false`, `0` and `""` mean "no id".
pub fn normalize_id(id: &Value) -> Option<String> {
    match id {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0) => None,
        Value::Number(n) => Some(format_json_number(n)),
        Value::Array(_) | Value::Object(_) => Some(id.to_string()),
    }
}

/// Per-class cache from string id to resource instance.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: OnceLock<Mutex<HashMap<String, Resource>>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance registered under `id`, or registers the one built by `make`.
    /// The flag is true when `make` ran.
    pub fn get_or_insert_with(&self, id: String, make: impl FnOnce() -> Resource) -> (Resource, bool) {
        let entries = self.entries.get_or_init(Default::default);
        let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&id) {
            return (existing.clone(), false);
        }
        let resource = make();
        entries.insert(id, resource.clone());
        (resource, true)
    }

    pub fn get(&self, id: &str) -> Option<Resource> {
        let entries = self.entries.get()?;
        let entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.get().map_or(0, |entries| {
            entries.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any id-bearing instance was ever created.
    pub fn is_initialized(&self) -> bool {
        self.entries.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(&json!(7)), Some("7".to_string()));
        assert_eq!(normalize_id(&json!(7.0)), Some("7".to_string()));
        assert_eq!(normalize_id(&json!(7.5)), Some("7.5".to_string()));
        assert_eq!(normalize_id(&json!("7")), Some("7".to_string()));
        assert_eq!(normalize_id(&json!("abc")), Some("abc".to_string()));
    }

    #[test]
    fn test_ids_beyond_f64_precision_stay_distinct() {
        assert_eq!(
            normalize_id(&json!(9_007_199_254_740_992_u64)),
            Some("9007199254740992".to_string())
        );
        assert_eq!(
            normalize_id(&json!(9_007_199_254_740_993_u64)),
            Some("9007199254740993".to_string())
        );
        assert_eq!(
            normalize_id(&json!(u64::MAX)),
            Some("18446744073709551615".to_string())
        );
    }

    #[test]
    fn test_falsy_ids_are_absent() {
        assert_eq!(normalize_id(&Value::Null), None);
        assert_eq!(normalize_id(&json!(0)), None);
        assert_eq!(normalize_id(&json!("")), None);
        assert_eq!(normalize_id(&json!(false)), None);
    }
}
