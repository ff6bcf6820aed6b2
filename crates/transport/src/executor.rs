//! reqwest-backed [`RequestExecutor`].

use std::error::Error as _;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use protocol::{
    ErrorCode, ExecutorResponse, HttpBody, HttpMethod, HttpRequest, IpFamily, RequestExecutor, RetryPolicy,
};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{TransportConfig, TransportError};

/// One failed attempt, already mapped onto the service's status codes.
#[derive(Debug, Clone, PartialEq)]
struct AttemptFailure {
    code: u16,
    message: Option<String>,
    retry_after: Option<Duration>,
}

/// Executes [`HttpRequest`]s over HTTPS with a bounded number of attempts.
///
/// Holds two connection pools: the default one, and one bound to the IPv6
/// unspecified address for requests that force [`IpFamily::V6`].
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    ipv6_client: Client,
    retry_delay: Duration,
}

impl HttpExecutor {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let builder = || {
            Client::builder()
                .timeout(config.request_timeout)
                .user_agent(config.user_agent.clone())
        };

        Ok(Self {
            client: builder().build()?,
            ipv6_client: builder()
                .local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED))
                .build()?,
            retry_delay: config.retry_delay,
        })
    }

    fn client_for(&self, family: Option<IpFamily>) -> &Client {
        match family {
            Some(IpFamily::V6) => &self.ipv6_client,
            None => &self.client,
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Value, AttemptFailure> {
        let mut builder = self
            .client_for(request.family)
            .request(method(request.method), &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        builder = match &request.body {
            Some(HttpBody::Json(body)) => builder.json(body),
            Some(HttpBody::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(network_failure)?;
        if response.status().is_success() {
            let bytes = response.bytes().await.map_err(network_failure)?;
            return Ok(success_body(&bytes));
        }
        Err(status_failure(response).await)
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: HttpRequest, max_attempts: u32) -> ExecutorResponse {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(
                method = request.method.as_str(),
                url = %request.url,
                attempt,
                max_attempts,
                "sending request"
            );

            let failure = match self.attempt(&request).await {
                Ok(body) => return ExecutorResponse::Success { body },
                Err(failure) => failure,
            };

            let delay = match retry_policy(failure.code) {
                RetryPolicy::Retryable if attempt < max_attempts => {
                    failure.retry_after.unwrap_or(self.retry_delay)
                }
                _ => {
                    return ExecutorResponse::Failure {
                        error_code: failure.code,
                        error: failure.message,
                    }
                }
            };

            warn!(
                url = %request.url,
                status = failure.code,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
    }
}

fn retry_policy(code: u16) -> RetryPolicy {
    ErrorCode::from_u16(code)
        .map(ErrorCode::retry_policy)
        .unwrap_or(RetryPolicy::NonRetryable)
}

/// Folds statuses the service never declares into the nearest declared one,
/// so callers only ever see codes some taxonomy knows about.
fn normalize_status(status: u16) -> u16 {
    match ErrorCode::from_u16(status) {
        Some(code) => code.as_u16(),
        None if status >= 500 => ErrorCode::ServerError.as_u16(),
        None => ErrorCode::BadRequest.as_u16(),
    }
}

/// Success bodies are JSON when they parse as JSON and a JSON string
/// otherwise. An empty body is `null`.
fn success_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

async fn status_failure(response: Response) -> AttemptFailure {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let text = response.text().await.unwrap_or_default();

    AttemptFailure {
        code: normalize_status(status.as_u16()),
        message: error_message(&text).or_else(|| status.canonical_reason().map(str::to_string)),
        retry_after,
    }
}

/// The `message` field of a JSON error body, or the raw text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map.get("message").and_then(Value::as_str).map(str::to_string),
        _ => Some(body.to_string()),
    }
}

fn network_failure(error: reqwest::Error) -> AttemptFailure {
    AttemptFailure {
        code: classify(&error).as_u16(),
        message: Some(error_chain(&error)),
        retry_after: None,
    }
}

fn classify(error: &reqwest::Error) -> ErrorCode {
    if error.is_timeout() {
        return ErrorCode::Timeout;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return ErrorCode::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return ErrorCode::Timeout,
                _ => {}
            }
        }
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return ErrorCode::DnsNotFound;
        }
        if text.contains("connection refused") {
            return ErrorCode::ConnectionRefused;
        }
        source = cause.source();
    }
    ErrorCode::ServiceUnavailable
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_statuses_pass_through() {
        for code in [304, 400, 401, 403, 404, 413, 500, 502, 503, 504] {
            assert_eq!(normalize_status(code), code);
        }
    }

    #[test]
    fn undeclared_statuses_fold_to_their_class() {
        assert_eq!(normalize_status(501), 500);
        assert_eq!(normalize_status(599), 500);
        assert_eq!(normalize_status(409), 400);
        assert_eq!(normalize_status(429), 400);
        assert_eq!(normalize_status(302), 400);
    }

    #[test]
    fn only_transient_codes_are_retried() {
        assert_eq!(retry_policy(503), RetryPolicy::Retryable);
        assert_eq!(retry_policy(421), RetryPolicy::Retryable);
        assert_eq!(retry_policy(452), RetryPolicy::NonRetryable);
        assert_eq!(retry_policy(404), RetryPolicy::NonRetryable);
        assert_eq!(retry_policy(999), RetryPolicy::NonRetryable);
    }

    #[test]
    fn error_message_prefers_the_json_message_field() {
        assert_eq!(
            error_message(r#"{"message": "bundle gone", "code": 404}"#),
            Some("bundle gone".to_string())
        );
        assert_eq!(error_message(r#"{"code": 404}"#), None);
        assert_eq!(error_message("plain failure"), Some("plain failure".to_string()));
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn success_bodies_fall_back_to_strings() {
        assert_eq!(success_body(br#"{"ok": true}"#), serde_json::json!({"ok": true}));
        assert_eq!(success_body(b"accepted"), Value::String("accepted".into()));
        assert_eq!(success_body(b""), Value::Null);
    }
}
