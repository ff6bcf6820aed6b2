mod common;

use std::sync::Arc;

use clients::{AnalysisClient, BundleClient, ReportClient, SessionBroker};
use common::{context, JsonEncoder, MockExecutor};
use protocol::{
    AnalysisOptions, ApiResult, BundleFiles, BundleHash, DraftToken, ErrorCode, Operation, PollId,
    ReportOptions, ScmReportOptions, Source,
};

/// Every status the executor can hand back.
const EXECUTOR_CODES: [u16; 12] = [304, 400, 401, 403, 404, 413, 421, 452, 500, 502, 503, 504];

/// Runs `operation` against an executor that fails with `error_code`.
async fn call(operation: Operation, error_code: u16) -> ApiResult<()> {
    let executor = Arc::new(MockExecutor::failing(error_code, Some("server says no")));
    let hash = BundleHash::new("b-1").unwrap();
    let poll_id = PollId::new("r-1").unwrap();
    let options = AnalysisOptions::default();

    match operation {
        Operation::CheckSession => SessionBroker::new(executor)
            .check_session("https://auth.test", &DraftToken::new_random(), None)
            .await
            .map(drop),
        Operation::GetFilters => BundleClient::new(executor, Arc::new(JsonEncoder::new()))
            .get_filters("https://deeproxy.test", &Source::new("cli").unwrap(), 1, None)
            .await
            .map(drop),
        Operation::CreateBundle => BundleClient::new(executor, Arc::new(JsonEncoder::new()))
            .create_bundle(&context(), &BundleFiles::new())
            .await
            .map(drop),
        Operation::CheckBundle => BundleClient::new(executor, Arc::new(JsonEncoder::new()))
            .check_bundle(&context(), &hash)
            .await
            .map(drop),
        Operation::ExtendBundle => BundleClient::new(executor, Arc::new(JsonEncoder::new()))
            .extend_bundle(&context(), &hash, &BundleFiles::new(), &[])
            .await
            .map(drop),
        Operation::GetAnalysis => AnalysisClient::new(executor)
            .get_analysis(&context(), &hash, &options, None)
            .await
            .map(drop),
        Operation::InitReport => {
            let report = ReportOptions {
                project_name: "demo".into(),
                target_name: None,
                target_ref: None,
                remote_repo_url: None,
            };
            ReportClient::new(executor)
                .init_report(&context(), &hash, &report, &options, None)
                .await
                .map(drop)
        }
        Operation::GetReport => ReportClient::new(executor)
            .get_report(&context(), &poll_id)
            .await
            .map(drop),
        Operation::InitScmReport => {
            let scm = ScmReportOptions {
                project_id: "p-1".into(),
                commit_id: "c0ffee".into(),
            };
            ReportClient::new(executor)
                .init_scm_report(&context(), &scm, &options, None)
                .await
                .map(drop)
        }
        Operation::GetScmReport => ReportClient::new(executor)
            .get_scm_report(&context(), &poll_id)
            .await
            .map(drop),
    }
}

#[tokio::test]
async fn every_executor_status_is_an_error_for_every_operation() {
    for operation in Operation::ALL {
        for code in EXECUTOR_CODES {
            let result = call(operation, code).await;

            // Login polling treats these as "not confirmed yet".
            if operation == Operation::CheckSession && matches!(code, 304 | 400 | 401) {
                assert_eq!(result, Ok(()), "{operation} {code}");
                continue;
            }

            let err = result.expect_err(&format!("{operation} accepted {code}"));
            assert_eq!(err.api_name(), operation);
            assert!(!err.is_local(), "{operation} {code}");
            if operation.taxonomy().declared(code).is_some() {
                assert_eq!(err.status_code().as_u16(), code, "{operation} {code}");
            } else {
                assert_eq!(err.status_code(), ErrorCode::ServerError, "{operation} {code}");
                assert!(err.status_text().contains(&code.to_string()), "{operation} {code}");
            }
        }
    }
}
