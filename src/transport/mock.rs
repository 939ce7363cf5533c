//! # Mock Transport & Testing Guide
//!
//! `MockTransport` implements [`Transport`] entirely in memory. You queue the requests
//! you expect together with the JSON (or error) each should answer with, hand the mock
//! to a [`Context`](crate::framework::Context), and at the end call
//! [`verify`](MockTransport::verify) to make sure every expectation was consumed and
//! nothing unexpected hit the "network".
//!
//! ## When to use the mock vs a real server
//!
//! | Feature | MockTransport | HttpTransport |
//! |---------|---------------|---------------|
//! | **Speed** | Instant (in-memory) | Network bound |
//! | **Determinism** | 100% Deterministic | Subject to the server |
//! | **Error Injection** | Easy (`return_err`) | Hard |
//! | **Use Case** | Lifecycle, identity map, collection logic | Smoke tests against a real API |
//!
//! ## Example
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
//!     let registry = Registry::new(Context::builder().transport(mock.clone()).build());
//!     let person = registry
//!         .define(ResourceDefinition::new("Person").field("name", FieldDef::string()).url("/people"))
//!         .unwrap();
//!
//!     let ada = person.create(json!({"id": 7}));
//!     assert!(ada.get("name").unwrap().is_none()); // triggers the fetch
//!     ada.fetch().unwrap().await;
//!     assert_eq!(ada.get("name").unwrap().unwrap().as_str(), Some("Ada"));
//!
//!     mock.verify();
//! }
//! ```
//!
//! ## Testing failure scenarios
//!
//! `return_err` makes the matching request fail. The resource still settles as fetched
//! and the error is handed to the context's error handler, which is exactly what
//! production code sees when the server is down.

use super::Transport;
use crate::framework::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// HTTP verb of a recorded or expected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        };
        f.write_str(verb)
    }
}

/// A request the mock has received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

struct Expectation {
    method: Method,
    url: String,
    response: Result<Value, TransportError>,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    requests: Vec<RecordedRequest>,
    unexpected: Vec<RecordedRequest>,
}

/// In-memory [`Transport`] with expectation tracking.
///
/// Cloning shares the same expectation queue and request log, so a test can keep
/// one handle while the context owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn expect_get(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Get, url.into())
    }

    pub fn expect_post(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Post, url.into())
    }

    pub fn expect_put(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Put, url.into())
    }

    fn expect(&self, method: Method, url: String) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            url,
            state: self.state.clone(),
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Panics unless every expectation was consumed and no request went unmatched.
    pub fn verify(&self) {
        let state = self.lock();
        if !state.unexpected.is_empty() {
            panic!("Unexpected requests: {:?}", state.unexpected);
        }
        if !state.expectations.is_empty() {
            let remaining: Vec<String> = state
                .expectations
                .iter()
                .map(|e| format!("{} {}", e.method, e.url))
                .collect();
            panic!("Not all expectations were met. Remaining: {remaining:?}");
        }
    }

    fn respond(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, TransportError> {
        let mut state = self.lock();
        let request = RecordedRequest {
            method,
            url: url.to_string(),
            body: body.cloned(),
        };
        state.requests.push(request.clone());

        // Concurrent fetches may arrive in any order, so match on method + URL
        // rather than strictly popping the front.
        let position = state
            .expectations
            .iter()
            .position(|e| e.method == method && e.url == url);
        match position.and_then(|i| state.expectations.remove(i)) {
            Some(expectation) => expectation.response,
            None => {
                state.unexpected.push(request);
                Err(TransportError::Unexpected {
                    method: method.to_string(),
                    url: url.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        self.respond(Method::Get, url, None)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.respond(Method::Post, url, Some(body))
    }

    async fn put_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.respond(Method::Put, url, Some(body))
    }
}

/// Builder returned by the `expect_*` methods.
pub struct ExpectationBuilder {
    method: Method,
    url: String,
    state: Arc<Mutex<MockState>>,
}

impl ExpectationBuilder {
    /// Answers the request with `json`.
    pub fn return_ok(self, json: Value) {
        self.push(Ok(json));
    }

    /// Fails the request with `error`.
    pub fn return_err(self, error: TransportError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Value, TransportError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.expectations.push_back(Expectation {
            method: self.method,
            url: self.url,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_answers_matching_requests() {
        let mock = MockTransport::new();
        mock.expect_get("/a").return_ok(json!({"a": 1}));
        mock.expect_put("/b/1").return_ok(json!({"ok": true}));

        // Out of order on purpose: matching is by method and URL.
        let put = mock.put_json("/b/1", &json!({"x": 1})).await.unwrap();
        let get = mock.get_json("/a").await.unwrap();

        assert_eq!(put, json!({"ok": true}));
        assert_eq!(get, json!({"a": 1}));
        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.requests()[0].body, Some(json!({"x": 1})));
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_rejects_unexpected_requests() {
        let mock = MockTransport::new();
        let result = mock.get_json("/nowhere").await;
        assert!(matches!(result, Err(TransportError::Unexpected { .. })));
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected requests")]
    async fn test_verify_reports_unexpected_requests() {
        let mock = MockTransport::new();
        let _ = mock.post_json("/nowhere", &json!({})).await;
        mock.verify();
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_reports_unmet_expectations() {
        let mock = MockTransport::new();
        mock.expect_get("/a").return_err(TransportError::Custom("down".into()));
        mock.verify();
    }
}
