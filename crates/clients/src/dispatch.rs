//! Request plumbing shared by every client.
//!
//! Turns URL failures into local errors, hands requests to the executor with
//! the right attempt budget, and maps the executor's envelope onto the calling
//! operation's taxonomy.

use protocol::{
    build_error, urls, ApiError, ApiResult, ConnectionContext, ErrorCode, ExecutorResponse, Headers,
    HttpMethod, HttpRequest, Operation, RequestExecutor, UrlError,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Headers for gzip-compressed bundle uploads. The common headers are applied
/// on top of these.
pub(crate) fn upload_headers(context: &ConnectionContext) -> Headers {
    let mut headers = Headers::new();
    headers.insert("content-type", "application/octet-stream");
    headers.insert("content-encoding", "gzip");
    context.apply_common_headers(&mut headers);
    headers
}

/// Resolves `path` (plus an optional validated path parameter) against the
/// context's base URL and org.
pub(crate) fn endpoint(
    context: &ConnectionContext,
    operation: Operation,
    path: &str,
    segment: Option<&str>,
) -> ApiResult<String> {
    let build = || -> Result<String, UrlError> {
        let path = match segment {
            Some(segment) => format!("{path}/{}", urls::path_segment(segment)?),
            None => path.to_string(),
        };
        urls::service_url(context.base_url(), &path, context.org().map(|o| o.as_str()))
    };
    build().map_err(|e| local_error(operation, e))
}

/// A pre-flight failure; nothing is sent.
pub(crate) fn local_error(operation: Operation, error: impl std::fmt::Display) -> ApiError {
    warn!(api = %operation, error = %error, "request not sent");
    ApiError::local(operation, error.to_string())
}

/// Builds an authenticated request carrying the context's common headers.
pub(crate) fn authenticated(context: &ConnectionContext, method: HttpMethod, url: String) -> HttpRequest {
    HttpRequest::new(method, url).with_headers(context.common_headers())
}

/// Dispatches `request` with `attempts` total attempts.
pub(crate) async fn execute(
    executor: &dyn RequestExecutor,
    operation: Operation,
    request: HttpRequest,
    attempts: u32,
) -> ExecutorResponse {
    debug!(
        api = %operation,
        method = request.method.as_str(),
        url = %request.url,
        attempts,
        "dispatching request"
    );
    executor.execute(request, attempts).await
}

/// Maps an executor failure onto `operation`'s taxonomy.
///
/// When `forward_message` is set, the executor's error text replaces the
/// taxonomy message. A status the operation does not declare is reported as
/// its server error, with the raw status kept in the message.
pub(crate) fn failure(
    operation: Operation,
    error_code: u16,
    error: Option<String>,
    forward_message: bool,
) -> ApiError {
    let err = match operation.taxonomy().declared(error_code) {
        Some(code) => {
            let message = if forward_message { error.as_deref() } else { None };
            build_error(code.as_u16(), operation, message)
        }
        None => {
            let message = match error.as_deref() {
                Some(text) => format!("Unexpected status {error_code}: {text}"),
                None => format!("Unexpected status {error_code}"),
            };
            build_error(ErrorCode::ServerError.as_u16(), operation, Some(&message))
        }
    };
    warn!(
        api = %operation,
        status = error_code,
        message = err.status_text(),
        transport_error = error.as_deref().unwrap_or_default(),
        "request failed"
    );
    err
}

/// Deserializes a success body. A body that does not match the expected shape
/// is reported as a server error of the calling operation.
pub(crate) fn decode<T: DeserializeOwned>(operation: Operation, body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| malformed(operation, e))
}

pub(crate) fn malformed(operation: Operation, error: serde_json::Error) -> ApiError {
    let message = format!("Malformed {operation} response: {error}");
    failure(operation, ErrorCode::ServerError.as_u16(), Some(message), true)
}
