//! Declarative schemas: raw field definitions, the compiler that expands them, and the
//! typed values flowing through compiled fields.

mod compiler;
mod field;
mod resolve;
mod value;

pub use crate::framework::SchemaError;
pub use compiler::{compile, Association, AssociationKind, FieldDescriptor, Schema};
pub use field::{DeserializeFn, FieldDef, FieldKind, SerializeFn};
pub use resolve::{TypeRef, TypeResolver};
pub use value::{
    coerce_boolean, coerce_date, coerce_number, coerce_string, FieldValue, PrimitiveType,
    ValueType,
};

pub(crate) use resolve::ClassRef;
pub(crate) use value::format_json_number;
