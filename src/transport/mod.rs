//! # Transport
//!
//! The network boundary. Resources never talk HTTP directly; they go through a
//! [`Transport`], which makes the whole engine testable with
//! [`MockTransport`](mock::MockTransport) and lets applications bring their own client.
//!
//! - [`HttpTransport`]: the production implementation on top of `reqwest`.
//! - [`mock`]: expectation-driven test double.

mod http;
pub mod mock;

pub use http::HttpTransport;

use crate::framework::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A boxed future resolving to a JSON document, used by injectable fetch functions.
pub type JsonFuture = Pin<Box<dyn Future<Output = Result<Value, TransportError>> + Send>>;

/// "Get JSON at URL" and "send JSON to URL".
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;

    /// Create: send `body` to a collection URL.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;

    /// Update: send `body` to an instance URL.
    async fn put_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}
