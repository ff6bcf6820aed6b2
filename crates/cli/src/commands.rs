//! Command implementations: upload sequencing and poll loops.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clients::{AnalysisClient, BundleClient, ReportClient, SessionBroker};
use protocol::{
    ApiResult, ConnectionContext, PayloadEncoder, PollId, PollResponse, ReportOptions, RequestExecutor,
    RemoteBundle, RetryPolicy, ScmReportOptions, MAX_RETRY_ATTEMPTS,
};
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};

use crate::config::{Args, Command};
use crate::files;

/// Extend rounds before giving up on a server that keeps reporting missing
/// files.
const MAX_UPLOAD_ROUNDS: usize = 5;

/// The four clients, sharing one executor.
pub struct Services {
    pub sessions: SessionBroker,
    pub bundles: BundleClient,
    pub analysis: AnalysisClient,
    pub reports: ReportClient,
}

impl Services {
    pub fn new(executor: Arc<dyn RequestExecutor>, encoder: Arc<dyn PayloadEncoder>) -> Self {
        Self {
            sessions: SessionBroker::new(executor.clone()),
            bundles: BundleClient::new(executor.clone(), encoder),
            analysis: AnalysisClient::new(executor.clone()),
            reports: ReportClient::new(executor),
        }
    }
}

pub async fn run(args: &Args, services: &Services) -> anyhow::Result<()> {
    match &args.command {
        Command::Login => login(args, services).await,
        Command::Filters => {
            let filters = services
                .bundles
                .get_filters(&args.api_host, &args.source()?, MAX_RETRY_ATTEMPTS, None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&filters)?);
            Ok(())
        }
        Command::Analyze { dir, analysis } => {
            let context = args.connection_context()?;
            let bundle = upload(services, &context, dir).await?;
            let options = analysis.options();

            let response = poll_until_terminal("analysis", args.poll_interval(), args.poll_timeout(), || {
                services.analysis.get_analysis(&context, &bundle.bundle_hash, &options, None)
            })
            .await?;
            print_result("analysis", response)
        }
        Command::Report {
            dir,
            project_name,
            target_name,
            target_ref,
            remote_repo_url,
            analysis,
        } => {
            let context = args.connection_context()?;
            let bundle = upload(services, &context, dir).await?;
            let report = ReportOptions {
                project_name: project_name.clone(),
                target_name: target_name.clone(),
                target_ref: target_ref.clone(),
                remote_repo_url: remote_repo_url.clone(),
            };

            let report_id = services
                .reports
                .init_report(&context, &bundle.bundle_hash, &report, &analysis.options(), None)
                .await?;
            let poll_id = PollId::from(report_id);
            let response = poll_until_terminal("report", args.poll_interval(), args.poll_timeout(), || {
                services.reports.get_report(&context, &poll_id)
            })
            .await?;
            print_result("report", response)
        }
        Command::ScmReport {
            project_id,
            commit_id,
            analysis,
        } => {
            let context = args.connection_context()?;
            let scm = ScmReportOptions {
                project_id: project_id.clone(),
                commit_id: commit_id.clone(),
            };

            let test_id = services
                .reports
                .init_scm_report(&context, &scm, &analysis.options(), None)
                .await?;
            let poll_id = PollId::from(test_id);
            let response = poll_until_terminal("scm report", args.poll_interval(), args.poll_timeout(), || {
                services.reports.get_scm_report(&context, &poll_id)
            })
            .await?;
            print_result("scm report", response)
        }
    }
}

async fn login(args: &Args, services: &Services) -> anyhow::Result<()> {
    let session = services.sessions.start_session(&args.auth_host, &args.source()?);
    eprintln!("Open this URL in your browser to log in:\n\n    {}\n", session.login_url);

    let family = services.sessions.get_ip_family(&args.auth_host).await;
    let deadline = Instant::now() + args.poll_timeout();
    loop {
        let token = services
            .sessions
            .check_session(&args.auth_host, &session.draft_token, family)
            .await?;
        if !token.is_empty() {
            println!("{token}");
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("login was not confirmed within {}s", args.poll_timeout().as_secs());
        }
        sleep(args.poll_interval()).await;
    }
}

/// Creates a bundle for `dir` and uploads whatever content the server lacks.
#[instrument(skip_all, fields(dir = %dir.display()))]
async fn upload(
    services: &Services,
    context: &ConnectionContext,
    dir: &Path,
) -> anyhow::Result<RemoteBundle> {
    let filters = services
        .bundles
        .get_filters(context.base_url(), context.source(), MAX_RETRY_ATTEMPTS, context.request_id())
        .await?;
    let files = files::collect(dir, &filters).with_context(|| format!("failed to collect {}", dir.display()))?;
    if files.is_empty() {
        bail!("no supported files found in {}", dir.display());
    }
    info!(files = files.len(), "collected files");

    let mut bundle = services.bundles.create_bundle(context, &files::descriptor(&files)).await?;
    for round in 1..=MAX_UPLOAD_ROUNDS {
        if bundle.is_complete() {
            info!(bundle_hash = %bundle.bundle_hash, "bundle uploaded");
            return Ok(bundle);
        }
        let batches = files::content_batches(&files, &bundle.missing_files);
        if batches.is_empty() {
            break;
        }
        info!(round, missing = bundle.missing_files.len(), batches = batches.len(), "uploading content");
        for batch in &batches {
            bundle = services.bundles.extend_bundle(context, &bundle.bundle_hash, batch, &[]).await?;
        }
    }

    if !bundle.is_complete() {
        warn!(missing = bundle.missing_files.len(), "server still reports missing files");
        bail!("{} file(s) could not be uploaded", bundle.missing_files.len());
    }
    Ok(bundle)
}

/// Calls `poll` every `interval` until it returns `FAILED` or `COMPLETE`.
///
/// Transient failures (those the executor would retry) do not end the loop;
/// only the deadline does. Any other error is returned immediately.
pub async fn poll_until_terminal<F, Fut>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut poll: F,
) -> anyhow::Result<PollResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<PollResponse>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match poll().await {
            Ok(response) if response.is_terminal() => return Ok(response),
            Ok(PollResponse::InProgress { status, progress }) => {
                info!(status = ?status, progress, "{what} in progress");
            }
            Ok(_) => {}
            Err(e) if e.status_code().retry_policy() == RetryPolicy::Retryable => {
                warn!(error = %e, "{what} poll failed, trying again");
            }
            Err(e) => return Err(e.into()),
        }
        if Instant::now() >= deadline {
            bail!("{what} did not finish within {}s", timeout.as_secs());
        }
        sleep(interval).await;
    }
}

fn print_result(what: &str, response: PollResponse) -> anyhow::Result<()> {
    match response {
        PollResponse::Complete(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        PollResponse::Failed => bail!("{what} failed"),
        PollResponse::InProgress { status, .. } => bail!("{what} stopped while {status:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use protocol::{build_error, AnalysisStatus, ApiError, Operation};
    use serde_json::json;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn polls_until_complete() {
        let calls = AtomicUsize::new(0);
        let response = poll_until_terminal("analysis", Duration::from_millis(10), Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if n < 2 {
                    PollResponse::InProgress {
                        status: AnalysisStatus::Analyzing,
                        progress: 0.5,
                    }
                } else {
                    PollResponse::Complete(json!({"sarif": {}}))
                })
            }
        })
        .await
        .unwrap();

        assert!(response.is_terminal());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn done_keeps_polling_until_timeout() {
        let result = poll_until_terminal("report", Duration::from_secs(1), Duration::from_secs(3), || async {
            Ok(PollResponse::InProgress {
                status: AnalysisStatus::Done,
                progress: 1.0,
            })
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("did not finish within 3s"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_do_not_stop_the_loop() {
        let calls = AtomicUsize::new(0);
        let response = poll_until_terminal("analysis", Duration::from_secs(1), Duration::from_secs(30), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Ok(PollResponse::InProgress {
                        status: AnalysisStatus::Analyzing,
                        progress: 0.3,
                    }),
                    1 => Err(build_error(503, Operation::GetAnalysis, None)),
                    _ => Ok(PollResponse::Complete(json!({"sarif": {}}))),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(response, PollResponse::Complete(json!({"sarif": {}})));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transient_errors_end_at_the_deadline() {
        let result = poll_until_terminal("report", Duration::from_secs(1), Duration::from_secs(3), || async {
            Err(build_error(502, Operation::GetReport, None))
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("did not finish within 3s"));
    }

    #[tokio::test(start_paused = true)]
    async fn api_errors_stop_the_loop() {
        let result = poll_until_terminal("report", Duration::from_secs(1), Duration::from_secs(3), || async {
            Err(ApiError::local(Operation::GetReport, "bad id"))
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.downcast_ref::<ApiError>().is_some());
    }

    #[test]
    fn failed_results_are_errors() {
        assert!(print_result("analysis", PollResponse::Failed).is_err());
        assert!(print_result("analysis", PollResponse::Complete(json!({}))).is_ok());
    }
}
