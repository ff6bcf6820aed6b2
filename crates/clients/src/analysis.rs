//! Analysis retrieval.

use std::sync::Arc;

use protocol::{
    payloads, AnalysisContext, AnalysisOptions, AnalysisResponse, ApiResult, BundleHash,
    ConnectionContext, ExecutorResponse, HttpMethod, Operation, PollResponse, RequestExecutor,
};
use tracing::{debug, instrument};

use crate::dispatch;

/// Requests analysis results for a bundle.
///
/// One call is one request; the caller polls until the response is terminal.
pub struct AnalysisClient {
    executor: Arc<dyn RequestExecutor>,
}

impl AnalysisClient {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    #[instrument(skip_all, fields(bundle_hash = %bundle_hash))]
    pub async fn get_analysis(
        &self,
        context: &ConnectionContext,
        bundle_hash: &BundleHash,
        options: &AnalysisOptions,
        analysis_context: Option<&AnalysisContext>,
    ) -> ApiResult<AnalysisResponse> {
        let operation = Operation::GetAnalysis;
        let url = dispatch::endpoint(context, operation, "/analysis", None)?;
        let request = dispatch::authenticated(context, HttpMethod::Post, url)
            .with_json(payloads::analysis_body(bundle_hash, options, analysis_context));

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => {
                let response = PollResponse::from_body(body).map_err(|e| dispatch::malformed(operation, e))?;
                debug!(status = ?response.status(), "analysis polled");
                Ok(response)
            }
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }
}
