//! # Transport
//!
//! The seam between the dispatcher and the upstream REST API.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Transport Seam                                  │
//! │                                                                         │
//! │  RequestDispatcher / SyncTrigger                                       │
//! │       │  TransportRequest { method, url: "/sales", headers, body }     │
//! │       ▼                                                                 │
//! │  ┌───────────────────────┐         ┌───────────────────────┐           │
//! │  │    HttpTransport      │   or    │    MockTransport      │           │
//! │  │  reqwest → base_url   │         │  in-memory dataset    │           │
//! │  └───────────┬───────────┘         └───────────┬───────────┘           │
//! │              │                                 │                        │
//! │              ▼                                 ▼                        │
//! │  Ok(TransportResponse { status, body })   any status, incl. 4xx/5xx    │
//! │  Err(TransportError)                      never got a response         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transport reports what happened on the wire. Deciding what a 401 or a
//! 500 means is the dispatcher's job.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use fuelpos_core::HttpMethod;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Request / Response
// =============================================================================

/// One call against the upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Endpoint path relative to the API base, e.g. `/sales/42`.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        TransportRequest {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Returns the bearer token carried by this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .and_then(|(_, v)| v.strip_prefix("Bearer "))
    }
}

/// What came back from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body. `None` for empty bodies (e.g. 204).
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        TransportResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Best-effort error text from the response body.
    pub fn error_message(&self) -> String {
        match &self.body {
            Some(Value::Object(map)) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("HTTP {}", self.status),
        }
    }
}

/// The call never produced a response.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure and the like.
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be built (bad path, unsupported body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Sends a [`TransportRequest`] somewhere and reports the outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Live transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for `base_url` with a per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> SyncResult<Self> {
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "unsupported scheme: {}",
                base_url.scheme()
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(HttpTransport { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path under the base URL, keeping the base path.
    ///
    /// `https://host/api` + `/sales/4` → `https://host/api/sales/4`
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Empty → `None`, JSON → value, anything else → the raw text.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(&request.url)?;

        let mut builder = self.client.request(reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            "HTTP response"
        );

        Ok(TransportResponse::new(status, parse_body(&text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let t = transport("https://pos.example.com/api");
        assert_eq!(
            t.endpoint("/sales/4").unwrap().as_str(),
            "https://pos.example.com/api/sales/4"
        );

        let t = transport("https://pos.example.com/api/");
        assert_eq!(
            t.endpoint("products").unwrap().as_str(),
            "https://pos.example.com/api/products"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = HttpTransport::new(
            Url::parse("ftp://pos.example.com").unwrap(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), None);
        assert_eq!(parse_body("  \n"), None);
        assert_eq!(parse_body(r#"{"id":1}"#), Some(json!({"id": 1})));
        assert_eq!(parse_body("Bad Gateway"), Some(json!("Bad Gateway")));
    }

    #[test]
    fn test_error_message() {
        let r = TransportResponse::new(422, Some(json!({"message": "quantity must be positive"})));
        assert_eq!(r.error_message(), "quantity must be positive");

        let r = TransportResponse::new(503, None);
        assert_eq!(r.error_message(), "HTTP 503");
        assert!(!r.is_success());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let req = TransportRequest::new(HttpMethod::Get, "/sales").with_headers(headers);
        assert_eq!(req.bearer_token(), Some("abc"));

        let req = TransportRequest::new(HttpMethod::Get, "/sales");
        assert_eq!(req.bearer_token(), None);
    }
}
