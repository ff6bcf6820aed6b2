//! Port traits for the collaborators the clients depend on.
//!
//! The clients never talk to a socket or a compressor directly. They describe
//! a request as an [`HttpRequest`] and hand it to a [`RequestExecutor`]; bundle
//! payloads go through a [`PayloadEncoder`]. Infrastructure crates supply the
//! implementations; tests supply recording mocks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::EncodeError;

// ---------------------------------------------------------------------------
// Request description
// ---------------------------------------------------------------------------

/// HTTP method of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// IP family a request must be dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V6,
}

impl IpFamily {
    /// Numeric family (`6`).
    pub fn as_u8(self) -> u8 {
        match self {
            IpFamily::V6 => 6,
        }
    }
}

/// Request headers, keyed case-insensitively.
///
/// Names are stored lower-cased; inserting an existing name replaces its
/// value, which is how later header layers override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Returns the value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no headers are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    /// Serialised as JSON with `content-type: application/json`.
    Json(Value),
    /// Sent verbatim; the caller sets the content headers.
    Bytes(Vec<u8>),
}

/// One request to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub body: Option<HttpBody>,
    /// Forces the connection onto one IP family when set.
    pub family: Option<IpFamily>,
}

impl HttpRequest {
    /// Creates a request with no headers, body or family constraint.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Headers::new(),
            body: None,
            family: None,
        }
    }

    /// Replaces the header set.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(HttpBody::Json(body));
        self
    }

    /// Sets a raw byte body.
    pub fn with_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = Some(HttpBody::Bytes(body));
        self
    }

    /// Forces the request onto `family` (or lifts the constraint with `None`).
    pub fn with_family(mut self, family: Option<IpFamily>) -> Self {
        self.family = family;
        self
    }
}

// ---------------------------------------------------------------------------
// Executor port
// ---------------------------------------------------------------------------

/// Raw outcome of one executed request, before any taxonomy is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorResponse {
    /// A 2xx response; `body` is the decoded response payload.
    Success { body: Value },
    /// Every attempt failed. `error_code` is the last HTTP status or a
    /// synthetic transport code; `error` is a server or transport message.
    Failure {
        error_code: u16,
        error: Option<String>,
    },
}

/// Performs one HTTP call with a bounded attempt budget.
///
/// `max_attempts` is the total number of attempts (values below 1 are treated
/// as 1). Implementations decide which failures are worth another attempt.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest, max_attempts: u32) -> ExecutorResponse;
}

// ---------------------------------------------------------------------------
// Encoder port
// ---------------------------------------------------------------------------

/// Turns a JSON payload into the compressed body used for bundle uploads.
///
/// The wire format is gzip over the base64 text of the JSON document.
pub trait PayloadEncoder: Send + Sync {
    fn encode(&self, payload: &Value) -> Result<Vec<u8>, EncodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Authorization", "a");
        headers.insert("authorization", "b");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("AUTHORIZATION"), Some("b"));
    }

    #[test]
    fn request_builder_sets_fields() {
        let request = HttpRequest::new(HttpMethod::Post, "https://x.test/a")
            .with_json(serde_json::json!({"a": 1}))
            .with_family(Some(IpFamily::V6));
        assert_eq!(request.method.as_str(), "POST");
        assert_eq!(request.family.map(IpFamily::as_u8), Some(6));
        assert!(matches!(request.body, Some(HttpBody::Json(_))));
    }
}
