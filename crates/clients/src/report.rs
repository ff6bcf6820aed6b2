//! File-based and SCM-based report workflows.
//!
//! Both workflows start a job (`POST /report`, `POST /test`) and are then
//! polled (`GET /report/{id}`, `GET /test/{id}`). The poll responses share the
//! analysis [`PollResponse`] shape, so a caller can drive all three targets
//! with one loop.

use std::sync::Arc;

use protocol::{
    payloads, AnalysisContext, AnalysisOptions, ApiResult, BundleHash, ConnectionContext,
    ExecutorResponse, HttpMethod, InitReportResponse, InitScmReportResponse, Operation, PollId,
    PollResponse, ReportId, ReportOptions, ReportResponse, RequestExecutor, ScmReportOptions, TestId,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::dispatch;

pub struct ReportClient {
    executor: Arc<dyn RequestExecutor>,
}

impl ReportClient {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Starts a file-based report for an uploaded bundle.
    #[instrument(
        skip_all,
        fields(bundle_hash = %bundle_hash, project = %report.project_name)
    )]
    pub async fn init_report(
        &self,
        context: &ConnectionContext,
        bundle_hash: &BundleHash,
        report: &ReportOptions,
        options: &AnalysisOptions,
        analysis_context: Option<&AnalysisContext>,
    ) -> ApiResult<ReportId> {
        let operation = Operation::InitReport;
        let url = dispatch::endpoint(context, operation, "/report", None)?;
        let body = payloads::report_body(bundle_hash, report, options, analysis_context);

        let response: InitReportResponse = self.start(context, operation, url, body).await?;
        let id = ReportId::new(response.report_id).ok_or_else(|| empty_id(operation))?;
        info!(report_id = %id, "report started");
        Ok(id)
    }

    /// Polls a file-based report.
    pub async fn get_report(&self, context: &ConnectionContext, poll_id: &PollId) -> ApiResult<ReportResponse> {
        self.poll(context, Operation::GetReport, "/report", poll_id).await
    }

    /// Starts an SCM-based report for a project commit.
    #[instrument(
        skip_all,
        fields(project_id = %scm.project_id, commit = %scm.commit_id)
    )]
    pub async fn init_scm_report(
        &self,
        context: &ConnectionContext,
        scm: &ScmReportOptions,
        options: &AnalysisOptions,
        analysis_context: Option<&AnalysisContext>,
    ) -> ApiResult<TestId> {
        let operation = Operation::InitScmReport;
        let url = dispatch::endpoint(context, operation, "/test", None)?;
        let body = payloads::scm_report_body(scm, options, analysis_context);

        let response: InitScmReportResponse = self.start(context, operation, url, body).await?;
        let id = TestId::new(response.test_id).ok_or_else(|| empty_id(operation))?;
        info!(test_id = %id, "scm report started");
        Ok(id)
    }

    /// Polls an SCM-based report.
    pub async fn get_scm_report(&self, context: &ConnectionContext, poll_id: &PollId) -> ApiResult<ReportResponse> {
        self.poll(context, Operation::GetScmReport, "/test", poll_id).await
    }

    async fn start<T: serde::de::DeserializeOwned>(
        &self,
        context: &ConnectionContext,
        operation: Operation,
        url: String,
        body: Value,
    ) -> ApiResult<T> {
        let request = dispatch::authenticated(context, HttpMethod::Post, url).with_json(body);

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => dispatch::decode(operation, body),
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }

    #[instrument(skip_all, fields(api = %operation, poll_id = %poll_id))]
    async fn poll(
        &self,
        context: &ConnectionContext,
        operation: Operation,
        path: &str,
        poll_id: &PollId,
    ) -> ApiResult<ReportResponse> {
        let url = dispatch::endpoint(context, operation, path, Some(poll_id.as_str()))?;
        let request = dispatch::authenticated(context, HttpMethod::Get, url);

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => {
                let response = PollResponse::from_body(body).map_err(|e| dispatch::malformed(operation, e))?;
                debug!(status = ?response.status(), "report polled");
                Ok(response)
            }
            // Report polls surface the server's own explanation when it sends one.
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, true))
            }
        }
    }
}

fn empty_id(operation: Operation) -> protocol::ApiError {
    dispatch::malformed(operation, serde::de::Error::custom("empty job id"))
}
