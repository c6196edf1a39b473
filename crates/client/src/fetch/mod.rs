//! HTTP transport and retry plumbing.
//!
//! The [`Transport`] trait is the only way the client touches the network,
//! so tests can swap in a scripted fake. [`HttpTransport`] is the real
//! implementation on a blocking reqwest client.

pub mod retry;
pub mod url;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub use self::retry::{Exhausted, Outcome, RetryPolicy, Sleeper, ThreadSleeper, with_retry};
pub use self::url::{Endpoints, UrlError};

/// Failure to complete an HTTP exchange at all.
///
/// Every variant is considered transient by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    /// A response arrived with a status the caller treats as transient.
    #[error("transient HTTP status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Attach a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Performs GET requests.
pub trait Transport: Send + Sync {
    fn get(&self, url: &::url::Url, headers: &[(&'static str, String)]) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &::url::Url, headers: &[(&'static str, String)]) -> Result<HttpResponse, TransportError> {
        let mut request = self.http.get(url.as_str());
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().map_err(|e| TransportError::Body(e.to_string()))?;

        tracing::trace!(url = %url, status = status.as_u16(), bytes = body.len(), "GET");
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_headers() {
        let resp = HttpResponse::new(403, "").with_header("x-ratelimit-remaining", "0");
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(resp.header("X-RateLimit-Remaining"), Some("0"));
        assert_eq!(resp.header("x-ratelimit-reset"), None);
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert!(TransportError::Status(503).to_string().contains("503"));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new("repodex-test", Duration::from_secs(1)).is_ok());
    }
}
