//! # Context
//!
//! The configuration every resource class is defined under: which [`Transport`] to use
//! and where fetch failures go. A `Context` is cheap to clone and passed explicitly;
//! there is no global instance, so tests can run side by side with their own mocks.

use super::error::TransportError;
use crate::transport::{HttpTransport, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Receives transport failures from fetches: the URL and the error.
pub type ErrorHandler = Arc<dyn Fn(&str, &TransportError) + Send + Sync>;

struct ContextInner {
    transport: Arc<dyn Transport>,
    error_handler: Option<ErrorHandler>,
}

/// Shared configuration for resource classes.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new(transport: impl Transport) -> Self {
        Self::builder().transport(transport).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Logs a fetch failure and hands it to the error handler, if one is configured.
    pub fn report_error(&self, class: &str, url: &str, error: &TransportError) {
        warn!(class, url, error = %error, "Fetch failed");
        if let Some(handler) = &self.inner.error_handler {
            handler(url, error);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("error_handler", &self.inner.error_handler.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    transport: Option<Arc<dyn Transport>>,
    error_handler: Option<ErrorHandler>,
}

impl ContextBuilder {
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &TransportError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Falls back to [`HttpTransport::from_env`] when no transport was given.
    pub fn build(self) -> Context {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::from_env()));
        Context {
            inner: Arc::new(ContextInner {
                transport,
                error_handler: self.error_handler,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_error_reaches_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = Context::builder()
            .transport(crate::transport::mock::MockTransport::new())
            .error_handler(move |url, err| sink.lock().unwrap().push(format!("{url}: {err}")))
            .build();

        context.report_error("Person", "/people/1", &TransportError::Custom("down".into()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["/people/1: Transport error: down".to_string()]
        );
    }

    #[test]
    fn test_report_error_without_handler_is_silent() {
        let context = Context::new(crate::transport::mock::MockTransport::new());
        context.report_error("Person", "/people/1", &TransportError::Custom("down".into()));
    }
}
