//! Remote bundle lifecycle: supported-file filters, creation, checks and
//! incremental extension.

use std::sync::Arc;

use protocol::{
    payloads, urls, ApiResult, BundleFiles, BundleHash, ConnectionContext, ExecutorResponse, Headers,
    HttpMethod, HttpRequest, Operation, PayloadEncoder, RemoteBundle, RequestExecutor, Source,
    SupportedFiles, REQUEST_ID_HEADER,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dispatch;

/// Creates, checks and extends bundles.
///
/// Each successful create or extend returns a new [`RemoteBundle`]; callers
/// keep the latest one and treat older hashes as parents only.
pub struct BundleClient {
    executor: Arc<dyn RequestExecutor>,
    encoder: Arc<dyn PayloadEncoder>,
}

impl BundleClient {
    pub fn new(executor: Arc<dyn RequestExecutor>, encoder: Arc<dyn PayloadEncoder>) -> Self {
        Self { executor, encoder }
    }

    /// Fetches the file names and extensions the service accepts.
    ///
    /// Unauthenticated and idempotent, so it spends the caller's `attempts`
    /// budget (typically [`protocol::MAX_RETRY_ATTEMPTS`]).
    #[instrument(skip(self, source, request_id))]
    pub async fn get_filters(
        &self,
        base_url: &str,
        source: &Source,
        attempts: u32,
        request_id: Option<&str>,
    ) -> ApiResult<SupportedFiles> {
        let operation = Operation::GetFilters;
        let url = urls::service_url(base_url, "/filters", Some(urls::PLACEHOLDER_ORG))
            .map_err(|e| dispatch::local_error(operation, e))?;

        let mut headers = Headers::new();
        headers.insert("source", source.as_str());
        if let Some(request_id) = request_id {
            headers.insert(REQUEST_ID_HEADER, request_id);
        }
        let request = HttpRequest::new(HttpMethod::Get, url).with_headers(headers);

        match dispatch::execute(self.executor.as_ref(), operation, request, attempts).await {
            ExecutorResponse::Success { body } => dispatch::decode(operation, body),
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }

    /// Creates a bundle from `files` (usually hashes only).
    ///
    /// The response lists the paths whose content the server still needs.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn create_bundle(
        &self,
        context: &ConnectionContext,
        files: &BundleFiles,
    ) -> ApiResult<RemoteBundle> {
        let operation = Operation::CreateBundle;
        let url = dispatch::endpoint(context, operation, "/bundle", None)?;
        let payload = payloads::create_bundle_body(files).map_err(|e| dispatch::local_error(operation, e))?;

        self.upload(context, operation, HttpMethod::Post, url, &payload).await
    }

    /// Reads back a bundle. A 404 means the bundle has expired.
    #[instrument(skip_all, fields(bundle_hash = %bundle_hash))]
    pub async fn check_bundle(
        &self,
        context: &ConnectionContext,
        bundle_hash: &BundleHash,
    ) -> ApiResult<RemoteBundle> {
        let operation = Operation::CheckBundle;
        let url = dispatch::endpoint(context, operation, "/bundle", Some(bundle_hash.as_str()))?;
        let request = dispatch::authenticated(context, HttpMethod::Get, url);

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => decode_bundle(operation, body),
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }

    /// Uploads a delta on top of `bundle_hash` and returns the extended bundle.
    ///
    /// `removed_files` must not name any path present in `files`; overlapping
    /// entries are passed through unchecked. A 404 means the parent bundle has
    /// expired and the caller has to create a new one.
    #[instrument(
        skip_all,
        fields(bundle_hash = %bundle_hash, files = files.len(), removed = removed_files.len())
    )]
    pub async fn extend_bundle(
        &self,
        context: &ConnectionContext,
        bundle_hash: &BundleHash,
        files: &BundleFiles,
        removed_files: &[String],
    ) -> ApiResult<RemoteBundle> {
        let operation = Operation::ExtendBundle;
        let url = dispatch::endpoint(context, operation, "/bundle", Some(bundle_hash.as_str()))?;
        let payload = payloads::extend_bundle_body(files, removed_files)
            .map_err(|e| dispatch::local_error(operation, e))?;

        self.upload(context, operation, HttpMethod::Put, url, &payload).await
    }

    async fn upload(
        &self,
        context: &ConnectionContext,
        operation: Operation,
        method: HttpMethod,
        url: String,
        payload: &Value,
    ) -> ApiResult<RemoteBundle> {
        let body = self
            .encoder
            .encode(payload)
            .map_err(|e| dispatch::local_error(operation, e))?;
        debug!(api = %operation, compressed_bytes = body.len(), "bundle payload encoded");

        let request = HttpRequest::new(method, url)
            .with_headers(dispatch::upload_headers(context))
            .with_bytes(body);

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => decode_bundle(operation, body),
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }
}

/// Decodes a bundle response. A bundle without a hash cannot be checked or
/// extended, so it is reported like any other malformed body.
fn decode_bundle(operation: Operation, body: Value) -> ApiResult<RemoteBundle> {
    let bundle: RemoteBundle = dispatch::decode(operation, body)?;
    if bundle.bundle_hash.as_str().is_empty() {
        return Err(dispatch::malformed(operation, serde::de::Error::custom("empty bundle hash")));
    }
    Ok(bundle)
}
