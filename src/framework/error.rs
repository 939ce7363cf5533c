//! # Errors
//!
//! Three layers of failure, from the bottom up:
//!
//! - [`TransportError`]: the network or the server said no. During a fetch these are
//!   never returned to the caller; they go to the [`Context`](crate::framework::Context)
//!   error handler and the resource still settles as fetched.
//! - [`SchemaError`]: the class definition is wrong or a value cannot be coerced to the
//!   declared field type. Fatal at the point of use.
//! - [`ResourceError`]: what the public operations return. Wraps the other two and adds
//!   the configuration failures (no URL, no runtime).

use serde_json::Value;
use thiserror::Error;

/// Errors produced by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected {method} request to {url}")]
    Unexpected { method: String, url: String },

    #[error("Transport error: {0}")]
    Custom(String),
}

/// Errors in a schema definition or in a value that does not fit it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// A class referenced by path is not known to the resolver.
    #[error("Unresolved resource type: {0}")]
    UnresolvedType(String),

    /// A class referenced by path was used after its registry went away,
    /// or no registry was given at all.
    #[error("No type resolver available for {0}")]
    ResolverUnavailable(String),

    #[error("Cannot coerce {found} to {expected}")]
    Coercion { expected: &'static str, found: String },

    /// An association field was handed something other than a resource.
    #[error("Field {field} expects a resource value")]
    NotAResource { field: String },

    #[error("Resource class {0} is already defined")]
    DuplicateClass(String),

    #[error("Field names must not be empty")]
    EmptyFieldName,
}

impl SchemaError {
    pub(crate) fn coercion(expected: &'static str, found: &Value) -> Self {
        SchemaError::Coercion {
            expected,
            found: found.to_string(),
        }
    }
}

/// Errors returned by resource, class and collection operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{class} has no field {field}")]
    UnknownField { class: String, field: String },

    #[error("{class} has no collection {name}")]
    UnknownCollection { class: String, name: String },

    /// The class (or collection) has no URL policy to fetch or save with.
    #[error("{class} has no URL configured")]
    MissingUrl { class: String },

    /// A fetch was started outside of a Tokio runtime.
    #[error("Fetching requires a running Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
