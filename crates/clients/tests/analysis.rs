mod common;

use std::sync::Arc;

use clients::AnalysisClient;
use common::{body_json, broken_context, context, MockExecutor};
use protocol::{
    AnalysisContext, AnalysisOptions, AnalysisStatus, BundleHash, ErrorCode, HttpMethod, Initiator,
    PollResponse, ProjectContext, MAX_RETRY_ATTEMPTS,
};
use serde_json::json;

fn bundle() -> BundleHash {
    BundleHash::new("b-1").unwrap()
}

#[tokio::test]
async fn in_progress_analysis_reports_progress() {
    let executor = Arc::new(MockExecutor::succeeding(json!({"status": "ANALYZING", "progress": 0.25})));

    let response = AnalysisClient::new(executor.clone())
        .get_analysis(&context(), &bundle(), &AnalysisOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(
        response,
        PollResponse::InProgress {
            status: AnalysisStatus::Analyzing,
            progress: 0.25,
        }
    );

    let (request, attempts) = executor.only_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://deeproxy.test/analysis");
    assert_eq!(attempts, MAX_RETRY_ATTEMPTS);
    assert_eq!(request.headers.get("authorization"), Some("session-token"));
    assert_eq!(request.headers.get("content-encoding"), None);
}

#[tokio::test]
async fn completed_analysis_passes_the_body_through() {
    let body = json!({
        "status": "COMPLETE",
        "sarif": {"runs": [{"results": []}]},
        "coverage": [{"files": 2, "isSupported": true, "lang": "JavaScript"}],
        "timing": {"analysis": 10, "fetchingCode": 3, "queue": 1}
    });
    let executor = Arc::new(MockExecutor::succeeding(body.clone()));

    let response = AnalysisClient::new(executor)
        .get_analysis(&context(), &bundle(), &AnalysisOptions::default(), None)
        .await
        .unwrap();
    assert!(response.is_terminal());
    assert_eq!(response, PollResponse::Complete(body));
}

#[tokio::test]
async fn request_body_carries_options_and_context() {
    let executor = Arc::new(MockExecutor::succeeding(json!({"status": "WAITING"})));
    let options = AnalysisOptions {
        severity: Some(2),
        prioritized: Some(true),
        limit_to_files: vec!["src/app.js".into()],
        ..AnalysisOptions::default()
    };
    let analysis_context = AnalysisContext {
        flow: "cli-test".into(),
        initiator: Initiator::Cli,
        org_display_name: None,
        org_public_id: None,
        project: ProjectContext {
            name: "demo".into(),
            public_id: "p-1".into(),
            project_type: "sast".into(),
        },
    };

    AnalysisClient::new(executor.clone())
        .get_analysis(&context(), &bundle(), &options, Some(&analysis_context))
        .await
        .unwrap();

    let (request, _) = executor.only_request();
    let body = body_json(&request);
    assert_eq!(body["key"]["type"], "file");
    assert_eq!(body["key"]["hash"], "b-1");
    assert_eq!(body["key"]["limitToFiles"], json!(["src/app.js"]));
    assert_eq!(body["severity"], 2);
    assert_eq!(body["prioritized"], true);
    assert_eq!(body["analysisContext"]["initiator"], "CLI");
    assert_eq!(body["analysisContext"]["project"]["type"], "sast");
}

#[tokio::test]
async fn server_errors_use_the_analysis_wording() {
    let executor = Arc::new(MockExecutor::failing(500, Some("boom")));

    let err = AnalysisClient::new(executor)
        .get_analysis(&context(), &bundle(), &AnalysisOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), ErrorCode::ServerError);
    assert_eq!(err.status_text(), "Getting analysis failed");
}

#[tokio::test]
async fn unknown_status_is_a_server_error() {
    let executor = Arc::new(MockExecutor::succeeding(json!({"status": "EXPLODED"})));

    let err = AnalysisClient::new(executor)
        .get_analysis(&context(), &bundle(), &AnalysisOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), ErrorCode::ServerError);
    assert!(err.status_text().starts_with("Malformed getAnalysis response"));
}

#[tokio::test]
async fn url_failure_is_local() {
    let executor = Arc::new(MockExecutor::new());

    let err = AnalysisClient::new(executor.clone())
        .get_analysis(&broken_context(), &bundle(), &AnalysisOptions::default(), None)
        .await
        .unwrap_err();
    assert!(err.is_local());
    assert_eq!(err.status_code(), ErrorCode::BadRequest);
    assert_eq!(executor.call_count(), 0);
}
