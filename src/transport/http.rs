use super::Transport;
use crate::framework::TransportError;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};

/// Environment variable read by [`HttpTransport::from_env`].
pub const BASE_URL_ENV: &str = "LAZY_RESOURCE_BASE_URL";

/// [`Transport`] backed by a `reqwest` client.
///
/// Resource URLs are usually relative (`/people/7`); when a base URL is set it is
/// prefixed to every URL that does not already carry a scheme.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    /// Uses `LAZY_RESOURCE_BASE_URL` as the base URL when it is set.
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(base) if !base.is_empty() => Self::with_base_url(base),
            _ => Self::new(),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn absolute(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.contains("://") => {
                if url.starts_with('/') {
                    format!("{base}{url}")
                } else {
                    format!("{base}/{url}")
                }
            }
            _ => url.to_string(),
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, TransportError> {
        let url = self.absolute(url);
        debug!(%method, %url, "Sending request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self))]
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        self.send(Method::GET, url, None).await
    }

    #[instrument(skip(self, body))]
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::POST, url, Some(body)).await
    }

    #[instrument(skip(self, body))]
    async fn put_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::PUT, url, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_urls_get_base_prefix() {
        let transport = HttpTransport::with_base_url("https://api.example.com/");
        assert_eq!(transport.base_url(), Some("https://api.example.com"));
        assert_eq!(transport.absolute("/people/7"), "https://api.example.com/people/7");
        assert_eq!(transport.absolute("people"), "https://api.example.com/people");
    }

    #[test]
    fn test_absolute_urls_are_untouched() {
        let transport = HttpTransport::with_base_url("https://api.example.com");
        assert_eq!(transport.absolute("http://other.test/x"), "http://other.test/x");
        assert_eq!(HttpTransport::new().absolute("/people"), "/people");
    }
}
