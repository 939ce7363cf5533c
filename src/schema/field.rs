//! Raw, declarative field definitions.

use super::resolve::TypeRef;
use super::value::{FieldValue, PrimitiveType};
use crate::framework::SchemaError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Turns a field value into the JSON stored in the data blob.
pub type SerializeFn = Arc<dyn Fn(&FieldValue) -> Result<Value, SchemaError> + Send + Sync>;

/// Turns the JSON stored in the data blob into a field value.
pub type DeserializeFn = Arc<dyn Fn(&Value) -> Result<FieldValue, SchemaError> + Send + Sync>;

/// What a raw field declares itself to be.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Primitive(PrimitiveType),
    Resource(TypeRef),
    /// Neither a primitive nor an association: passed through untouched.
    Opaque,
}

/// One entry of a raw schema, before compilation.
///
/// ```rust
/// use lazy_resource::schema::FieldDef;
///
/// let title = FieldDef::string();
/// let author = FieldDef::resource("Person");             // stored as author_id
/// let address = FieldDef::nested("Address");             // stored inline
/// let legacy = FieldDef::number().key("meta.legacy_id"); // custom storage key
/// ```
#[derive(Clone)]
pub struct FieldDef {
    pub(crate) kind: FieldKind,
    pub(crate) key: Option<String>,
    pub(crate) nested: bool,
    pub(crate) serialize: Option<SerializeFn>,
    pub(crate) deserialize: Option<DeserializeFn>,
}

impl FieldDef {
    pub fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            key: None,
            nested: false,
            serialize: None,
            deserialize: None,
        }
    }

    pub fn primitive(ty: PrimitiveType) -> Self {
        Self::of(FieldKind::Primitive(ty))
    }

    pub fn number() -> Self {
        Self::primitive(PrimitiveType::Number)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveType::String)
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveType::Boolean)
    }

    pub fn date() -> Self {
        Self::primitive(PrimitiveType::Date)
    }

    pub fn opaque() -> Self {
        Self::of(FieldKind::Opaque)
    }

    /// Referenced association: the data holds only the target's id.
    pub fn resource(target: impl Into<TypeRef>) -> Self {
        Self::of(FieldKind::Resource(target.into()))
    }

    /// Nested association: the data holds the target's whole payload.
    pub fn nested(target: impl Into<TypeRef>) -> Self {
        Self::resource(target).embedded(true)
    }

    /// Sets the `nested` flag; only meaningful for associations.
    pub fn embedded(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Overrides the storage key. Dotted keys address nested objects.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn serialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<Value, SchemaError> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    pub fn deserialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<FieldValue, SchemaError> + Send + Sync + 'static,
    {
        self.deserialize = Some(Arc::new(f));
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

impl From<PrimitiveType> for FieldDef {
    fn from(ty: PrimitiveType) -> Self {
        FieldDef::primitive(ty)
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("nested", &self.nested)
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .finish()
    }
}
