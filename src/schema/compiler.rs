//! # Schema Compiler
//!
//! Expands raw [`FieldDef`]s into [`FieldDescriptor`]s: every descriptor leaves with a
//! storage key and a serialize/deserialize pair, chosen by exactly one of three rules.
//!
//! | Declared as | Storage key | serialize | deserialize |
//! |-------------|-------------|-----------|-------------|
//! | primitive | field name | coerce | coerce |
//! | nested association | field name | target's data payload | `target.create(payload)` |
//! | referenced association | `<field>_id` | target's id | `target.create({id})` |
//!
//! A referenced association whose id key is not declared by any sibling gets a
//! synthetic Number field of that name. Explicit `serialize`/`deserialize` on the raw
//! entry always win over the defaults.

use super::field::{DeserializeFn, FieldDef, FieldKind, SerializeFn};
use super::resolve::{ClassRef, TypeResolver};
use super::value::{FieldValue, PrimitiveType, ValueType};
use crate::framework::{ResourceClass, SchemaError};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// How an associated resource is stored in its parent's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    Nested,
    Referenced,
}

/// The association part of a compiled field.
#[derive(Debug, Clone)]
pub struct Association {
    kind: AssociationKind,
    target: Arc<ClassRef>,
}

impl Association {
    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Resolves the target class, looking it up by path on first use.
    pub fn target_class(&self) -> Result<ResourceClass, SchemaError> {
        self.target.get()
    }
}

/// A compiled schema entry.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    storage_key: String,
    value_type: ValueType,
    association: Option<Association>,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn association(&self) -> Option<&Association> {
        self.association.as_ref()
    }

    pub fn is_nested(&self) -> bool {
        matches!(
            &self.association,
            Some(Association {
                kind: AssociationKind::Nested,
                ..
            })
        )
    }

    pub fn serialize(&self, value: &FieldValue) -> Result<Value, SchemaError> {
        (self.serialize)(value)
    }

    pub fn deserialize(&self, json: &Value) -> Result<FieldValue, SchemaError> {
        (self.deserialize)(json)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("storage_key", &self.storage_key)
            .field("value_type", &self.value_type)
            .field("association", &self.association)
            .finish()
    }
}

/// Compiled schema: field name to descriptor. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, Arc<FieldDescriptor>>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FieldDescriptor>> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compiles a raw schema.
///
/// `resolver` serves associations declared by path. It is only consulted when such a
/// field first serializes or deserializes, so it may be missing at compile time as
/// long as path-typed fields are never used.
pub fn compile(
    raw: BTreeMap<String, FieldDef>,
    resolver: Option<Weak<dyn TypeResolver>>,
) -> Result<Schema, SchemaError> {
    let mut declared: BTreeSet<String> = raw.keys().cloned().collect();
    declared.extend(raw.values().filter_map(|def| def.key.clone()));

    let mut fields = BTreeMap::new();
    for (name, def) in raw {
        if name.is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }
        let descriptor = compile_field(&name, def, &resolver);

        if let Some(Association {
            kind: AssociationKind::Referenced,
            ..
        }) = &descriptor.association
        {
            let id_key = descriptor.storage_key.clone();
            if declared.insert(id_key.clone()) {
                let id_field = compile_field(&id_key, FieldDef::number(), &resolver);
                fields.insert(id_key, Arc::new(id_field));
            }
        }

        fields.insert(name, Arc::new(descriptor));
    }

    Ok(Schema { fields })
}

fn compile_field(
    name: &str,
    def: FieldDef,
    resolver: &Option<Weak<dyn TypeResolver>>,
) -> FieldDescriptor {
    let FieldDef {
        kind,
        key,
        nested,
        serialize,
        deserialize,
    } = def;

    let (storage_key, value_type, association, defaults) = match kind {
        FieldKind::Primitive(ty) => (
            key.unwrap_or_else(|| name.to_string()),
            ty.value_type(),
            None,
            primitive_codec(ty),
        ),
        FieldKind::Resource(target) => {
            let target = Arc::new(ClassRef::new(target, resolver.clone()));
            let (kind, storage_key, codec) = if nested {
                (
                    AssociationKind::Nested,
                    key.unwrap_or_else(|| name.to_string()),
                    nested_codec(name, target.clone()),
                )
            } else {
                (
                    AssociationKind::Referenced,
                    key.unwrap_or_else(|| format!("{name}_id")),
                    referenced_codec(name, target.clone()),
                )
            };
            (
                storage_key,
                ValueType::Resource,
                Some(Association { kind, target }),
                codec,
            )
        }
        FieldKind::Opaque => (
            key.unwrap_or_else(|| name.to_string()),
            ValueType::Any,
            None,
            opaque_codec(),
        ),
    };

    let (default_serialize, default_deserialize) = defaults;
    FieldDescriptor {
        name: name.to_string(),
        storage_key,
        value_type,
        association,
        serialize: serialize.unwrap_or(default_serialize),
        deserialize: deserialize.unwrap_or(default_deserialize),
    }
}

fn primitive_codec(ty: PrimitiveType) -> (SerializeFn, DeserializeFn) {
    let serialize: SerializeFn = Arc::new(move |value: &FieldValue| {
        ty.coerce(&value.to_json()).map(|coerced| coerced.to_json())
    });
    let deserialize: DeserializeFn = Arc::new(move |json: &Value| ty.coerce(json));
    (serialize, deserialize)
}

fn opaque_codec() -> (SerializeFn, DeserializeFn) {
    let serialize: SerializeFn = Arc::new(|value: &FieldValue| Ok(value.to_json()));
    let deserialize: DeserializeFn = Arc::new(|json: &Value| Ok(FieldValue::Json(json.clone())));
    (serialize, deserialize)
}

fn nested_codec(name: &str, target: Arc<ClassRef>) -> (SerializeFn, DeserializeFn) {
    let field = name.to_string();
    let serialize: SerializeFn = Arc::new(move |value: &FieldValue| match value {
        FieldValue::Resource(resource) => Ok(resource.data().unwrap_or(Value::Null)),
        FieldValue::Null => Ok(Value::Null),
        _ => Err(SchemaError::NotAResource {
            field: field.clone(),
        }),
    });
    let deserialize: DeserializeFn = Arc::new(move |json: &Value| {
        if json.is_null() {
            return Ok(FieldValue::Null);
        }
        let class = target.get()?;
        Ok(FieldValue::Resource(class.create(json.clone())))
    });
    (serialize, deserialize)
}

fn referenced_codec(name: &str, target: Arc<ClassRef>) -> (SerializeFn, DeserializeFn) {
    let field = name.to_string();
    let serialize: SerializeFn = Arc::new(move |value: &FieldValue| match value {
        FieldValue::Resource(resource) => Ok(resource.raw_id().unwrap_or(Value::Null)),
        FieldValue::Null => Ok(Value::Null),
        _ => Err(SchemaError::NotAResource {
            field: field.clone(),
        }),
    });
    let deserialize: DeserializeFn = Arc::new(move |id: &Value| {
        if id.is_null() {
            return Ok(FieldValue::Null);
        }
        let class = target.get()?;
        Ok(FieldValue::Resource(class.create(json!({ "id": id }))))
    });
    (serialize, deserialize)
}
