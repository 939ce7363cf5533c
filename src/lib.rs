#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Lazy Resource
//!
//! > **Declarative REST resources that fetch themselves on first read.**
//!
//! You declare a resource class once (its fields, their types, how it associates with
//! other classes, where it lives on the server) and get back a class whose instances
//! behave like plain objects. Reading a field that has not been loaded yet answers
//! "not yet" and starts a single GET in the background; every other reader joins that
//! same request.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why lazy?
//!
//! Client code holding a reference (`{"author_id": 7}`) should not have to decide when
//! to load the author. It creates the author instance, reads what it needs, and the
//! first read that misses does the loading. Instances that are never read are never
//! fetched.
//!
//! ### Why an identity map?
//!
//! Every class keeps at most one instance per id. Two posts by the same author point at
//! the same `Resource`, so data fetched through one is visible through the other and
//! the author is fetched once.
//!
//! ## 🚀 Core Concepts
//!
//! ### The lifecycle
//! Resources and collections move through `INITIALIZING -> UNFETCHED -> FETCHING ->
//! FETCHED`, forward only. A failed request still ends in FETCHED: the error goes to the
//! context's error handler and reads keep answering `None`.
//! See the [`lifecycle`] module.
//!
//! ### Associations
//! A field can hold another resource, either **nested** (the whole payload lives inside
//! the parent's data) or **referenced** (only `<field>_id` is stored, and the associated
//! instance loads itself when read). See the [`schema`] module.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Explicit context
//! There is no global state besides each class's identity map. The transport and the
//! error handler travel in a [`Context`](framework::Context), and classes that name each
//! other by path are defined through a [`Registry`](framework::Registry).
//!
//! ### 2. Concurrency model
//! Fetches are spawned onto the current Tokio runtime; reads never block. The
//! lifecycle keeps one in-flight fetch per instance, so concurrent readers share it.
//! [`FetchHandle`](lifecycle::FetchHandle) is awaitable for callers that want the data.
//!
//! ### 3. Observability
//! Everything logs through `tracing` with structured `class`/`id`/`url` fields.
//! See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Object Model ([`framework`])
//! - **Role**: Classes, instances, the registry and the shared context.
//! - **Key items**: [`ResourceClass`](framework::ResourceClass),
//!   [`Resource`](framework::Resource), [`Registry`](framework::Registry).
//!
//! ### 2. The Schema ([`schema`], [`property`])
//! - **Role**: Compiles declared fields into storage keys and codecs, and turns them into
//!   accessors over the instance's JSON data.
//! - **Key items**: [`FieldDef`](schema::FieldDef), [`Accessor`](property::Accessor).
//!
//! ### 3. State ([`lifecycle`], [`identity`])
//! - **Role**: The fetch state machine and the per-class identity map.
//!
//! ### 4. Lists ([`collection`])
//! - **Role**: Ordered, lazily fetched lists of one class, optionally declared on an
//!   owner class with an id-templated URL.
//!
//! ### 5. The Network ([`transport`])
//! - **Role**: The [`Transport`](transport::Transport) trait, the `reqwest`-based
//!   [`HttpTransport`](transport::HttpTransport) and the test double in
//!   [`transport::mock`].
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use lazy_resource::framework::{Context, Registry, ResourceDefinition};
//! use lazy_resource::schema::FieldDef;
//! use lazy_resource::transport::mock::MockTransport;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mock = MockTransport::new();
//!     mock.expect_get("/people/7").return_ok(json!({"id": 7, "name": "Ada"}));
//!
//!     let registry = Registry::new(Context::new(mock.clone()));
//!     let post = registry
//!         .define(
//!             ResourceDefinition::new("Post")
//!                 .field("title", FieldDef::string())
//!                 .field("author", FieldDef::resource("Person"))
//!                 .url("/posts"),
//!         )
//!         .unwrap();
//!     registry
//!         .define(ResourceDefinition::new("Person").field("name", FieldDef::string()).url("/people"))
//!         .unwrap();
//!
//!     let hello = post.create(json!({"id": 1, "title": "Hello", "author_id": 7}));
//!     let author = hello.get("author").unwrap().unwrap();
//!     let author = author.as_resource().unwrap();
//!
//!     assert!(author.get("name").unwrap().is_none()); // GET /people/7 starts here
//!     author.fetch().unwrap().await;
//!     assert_eq!(author.get("name").unwrap().unwrap().as_str(), Some("Ada"));
//!     mock.verify();
//! }
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! RUST_LOG=debug cargo test
//! ```

pub mod collection;
pub mod framework;
pub mod identity;
pub mod lifecycle;
pub mod property;
pub mod schema;
pub mod transport;

pub use collection::{CollectionDef, ResourceCollection};
pub use framework::{
    Context, Registry, Resource, ResourceClass, ResourceDefinition, ResourceError, SchemaError,
    TransportError,
};
pub use lifecycle::{FetchHandle, ResourceState};
pub use schema::{FieldDef, FieldValue};
