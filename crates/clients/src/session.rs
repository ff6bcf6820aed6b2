//! Login sessions: draft token issuance, IPv6 probing, and confirmation polls.

use std::sync::Arc;

use protocol::{
    payloads, urls, ApiResult, ApiTokenResponse, DraftToken, ErrorCode, ExecutorResponse, HttpMethod,
    HttpRequest, IpFamily, Operation, RequestExecutor, SessionRecord, Source,
};
use tracing::{debug, info, instrument};

use crate::dispatch;

/// Statuses the verify-callback returns while the user has not finished
/// logging in. They mean "poll again", not failure.
const PENDING_CODES: [ErrorCode; 3] = [
    ErrorCode::LoginInProgress,
    ErrorCode::BadRequest,
    ErrorCode::UnauthorizedUser,
];

/// Drives the browser login flow.
///
/// A caller starts a session, shows the login URL, optionally probes IPv6,
/// then calls [`SessionBroker::check_session`] on its own cadence until a
/// non-empty token comes back.
pub struct SessionBroker {
    executor: Arc<dyn RequestExecutor>,
}

impl SessionBroker {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Issues a fresh draft token and the login URL embedding it.
    pub fn start_session(&self, auth_host: &str, source: &Source) -> SessionRecord {
        let draft_token = DraftToken::new_random();
        let login_url = urls::login_url(auth_host, &draft_token, source);
        info!(draft_token = %draft_token, "login session started");
        SessionRecord {
            draft_token,
            login_url,
        }
    }

    /// Sends one request forced onto IPv6.
    ///
    /// Returns `Some(IpFamily::V6)` if it went through and `None` if the
    /// network cannot route it. Never retried; the answer is only a hint for
    /// later [`SessionBroker::check_session`] calls.
    #[instrument(skip(self))]
    pub async fn get_ip_family(&self, auth_host: &str) -> Option<IpFamily> {
        let request = HttpRequest::new(HttpMethod::Post, urls::verify_callback_url(auth_host))
            .with_family(Some(IpFamily::V6));

        match self.executor.execute(request, 1).await {
            ExecutorResponse::Success { .. } => Some(IpFamily::V6),
            ExecutorResponse::Failure { error_code, error } => {
                debug!(error_code, error = error.as_deref().unwrap_or_default(), "IPv6 probe failed");
                None
            }
        }
    }

    /// Asks whether the login for `draft_token` has been confirmed.
    ///
    /// Returns the API token once confirmed and an empty string while the login
    /// is still pending. Only transport failures and unexpected statuses are
    /// errors.
    #[instrument(skip(self, draft_token), fields(draft_token = %draft_token))]
    pub async fn check_session(
        &self,
        auth_host: &str,
        draft_token: &DraftToken,
        ip_family: Option<IpFamily>,
    ) -> ApiResult<String> {
        let operation = Operation::CheckSession;
        let request = HttpRequest::new(HttpMethod::Post, urls::verify_callback_url(auth_host))
            .with_json(payloads::check_session_body(draft_token))
            .with_family(ip_family);

        match dispatch::execute(self.executor.as_ref(), operation, request, operation.max_attempts()).await {
            ExecutorResponse::Success { body } => {
                // Any body that is not a confirmed token reads as "still pending".
                let response: ApiTokenResponse = serde_json::from_value(body).unwrap_or_default();
                let token = match response {
                    ApiTokenResponse { ok: true, api: Some(api) } => api,
                    _ => String::new(),
                };
                if !token.is_empty() {
                    info!("login confirmed");
                }
                Ok(token)
            }
            ExecutorResponse::Failure { error_code, .. }
                if PENDING_CODES.iter().any(|c| c.as_u16() == error_code) =>
            {
                debug!(error_code, "login still pending");
                Ok(String::new())
            }
            ExecutorResponse::Failure { error_code, error } => {
                Err(dispatch::failure(operation, error_code, error, false))
            }
        }
    }
}
