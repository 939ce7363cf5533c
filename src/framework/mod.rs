//! Resource classes and their instances.
//!
//! This module ties the layers together into the public object model.
//!
//! # Main Components
//!
//! - [`ResourceDefinition`] - What a class is declared with: fields, URL, hooks
//! - [`ResourceClass`] - A defined class; creates instances through its identity map
//! - [`Resource`] - An instance: lazy field reads, `fetch`, `save`
//! - [`Registry`] - Name to class table; resolves associations declared by path
//! - [`Context`] - Transport and error handler shared by a set of classes
//! - [`ResourceError`], [`SchemaError`], [`TransportError`] - Error types
//!
//! # Testing
//!
//! See [`crate::transport::mock`] for running classes against an in-memory transport.

mod class;
mod context;
mod error;
mod registry;
mod resource;

pub use class::{ParseFn, ResourceClass, ResourceDefinition, ToJsonFn, UrlFn, UrlPolicy};
pub use context::{Context, ContextBuilder, ErrorHandler};
pub use error::{ResourceError, SchemaError, TransportError};
pub use registry::Registry;
pub use resource::Resource;
