//! Error codes, per-operation error taxonomies, and the closed error result.
//!
//! Every network interaction is reduced to [`ApiResult`]. The error half,
//! [`ApiError`], can only carry a code that the calling [`Operation`] declares
//! in its [`ErrorTaxonomy`]. [`build_error`] enforces this at construction time
//! and panics on a mismatch: an operation surfacing a status its taxonomy never
//! declared is a programming error to be caught in tests.
//!
//! The only errors exempt from the taxonomy are local pre-flight failures (a URL
//! that cannot be built, a payload that cannot be encoded). They are created
//! with [`ApiError::local`], always carry [`ErrorCode::BadRequest`], and never
//! reach the network.
//!
//! [`UrlError`] and [`EncodeError`] are the infrastructure errors that feed
//! those local failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted bundle payload, in bytes.
pub const MAX_PAYLOAD: usize = 30 * 1024 * 1024;

/// Attempt budget for idempotent reads (`getFilters` default, `checkBundle`,
/// report polls).
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Default delay between retried attempts.
pub const REQUEST_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Closed result of every service call.
pub type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Every status code the service protocol knows about.
///
/// The numeric values are the wire values reported by the request executor.
/// `ConnectionRefused` and `DnsNotFound` are synthetic codes for failures that
/// never produced an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ErrorCode {
    /// Login started but not yet confirmed by the user.
    LoginInProgress,
    /// The request was malformed, or a local pre-flight check failed.
    BadRequest,
    /// Missing, revoked or inactive session token.
    UnauthorizedUser,
    /// The token is valid but may not access the requested bundle.
    UnauthorizedBundleAccess,
    /// The addressed resource does not exist (or has expired).
    NotFound,
    /// The request payload exceeded [`MAX_PAYLOAD`].
    BigPayload,
    /// The TCP connection was refused.
    ConnectionRefused,
    /// The host name could not be resolved.
    DnsNotFound,
    /// Generic 500.
    ServerError,
    /// Generic 502.
    BadGateway,
    /// Generic 503, also used for transport failures without a better match.
    ServiceUnavailable,
    /// Generic 504, also used for client-side timeouts.
    Timeout,
}

impl ErrorCode {
    /// All known codes, in ascending numeric order.
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::LoginInProgress,
        ErrorCode::BadRequest,
        ErrorCode::UnauthorizedUser,
        ErrorCode::UnauthorizedBundleAccess,
        ErrorCode::NotFound,
        ErrorCode::BigPayload,
        ErrorCode::ConnectionRefused,
        ErrorCode::DnsNotFound,
        ErrorCode::ServerError,
        ErrorCode::BadGateway,
        ErrorCode::ServiceUnavailable,
        ErrorCode::Timeout,
    ];

    /// Returns the numeric wire value.
    pub const fn as_u16(self) -> u16 {
        match self {
            ErrorCode::LoginInProgress => 304,
            ErrorCode::BadRequest => 400,
            ErrorCode::UnauthorizedUser => 401,
            ErrorCode::UnauthorizedBundleAccess => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::BigPayload => 413,
            ErrorCode::ConnectionRefused => 421,
            ErrorCode::DnsNotFound => 452,
            ErrorCode::ServerError => 500,
            ErrorCode::BadGateway => 502,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::Timeout => 504,
        }
    }

    /// Resolves a numeric wire value, returning `None` for unknown codes.
    pub fn from_u16(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u16() == code)
    }

    /// Human-readable message used when an operation does not override it.
    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorCode::LoginInProgress => "Login has not been confirmed yet",
            ErrorCode::BadRequest => "Bad request",
            ErrorCode::UnauthorizedUser => "Missing, revoked or inactive token",
            ErrorCode::UnauthorizedBundleAccess => "Unauthorized access to requested bundle analysis",
            ErrorCode::NotFound => "Not found",
            ErrorCode::BigPayload => "Payload too large (max is 31457280b)",
            ErrorCode::ConnectionRefused => "[Connection issue] Connection refused",
            ErrorCode::DnsNotFound => "[Connection issue] Could not resolve domain",
            ErrorCode::ServerError => "Unexpected server error",
            ErrorCode::BadGateway => "Bad gateway",
            ErrorCode::ServiceUnavailable => "Service unavailable",
            ErrorCode::Timeout => "Timeout occurred. Try again later.",
        }
    }

    /// Whether a failed attempt carrying this code may be re-sent by the
    /// request executor (within the operation's attempt budget).
    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            ErrorCode::ServerError
            | ErrorCode::BadGateway
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::ConnectionRefused => RetryPolicy::Retryable,
            _ => RetryPolicy::NonRetryable,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.as_u16()
    }
}

/// A numeric status that is not part of the protocol's code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown error code {0}")]
pub struct UnknownErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_u16(code).ok_or(UnknownErrorCode(code))
    }
}

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry.
///
/// Consulted by the request executor between attempts; the back-off comes from
/// the response's `Retry-After` or the executor's configured delay. Whether an
/// operation gets more than one attempt at all is decided by
/// [`Operation::max_attempts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The attempt may be repeated.
    Retryable,
    /// The failure is final for this call.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Taxonomies
// ---------------------------------------------------------------------------

/// One declared code with its default message.
pub type TaxonomyEntry = (ErrorCode, &'static str);

const fn entry(code: ErrorCode) -> TaxonomyEntry {
    (code, code.default_message())
}

/// Transport-level failures every operation may report.
pub const GENERIC_ERRORS: [TaxonomyEntry; 6] = [
    entry(ErrorCode::ServerError),
    entry(ErrorCode::BadGateway),
    entry(ErrorCode::ServiceUnavailable),
    entry(ErrorCode::Timeout),
    entry(ErrorCode::DnsNotFound),
    entry(ErrorCode::ConnectionRefused),
];

const CHECK_SESSION_ERRORS: [TaxonomyEntry; 2] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::LoginInProgress),
];

const CREATE_BUNDLE_ERRORS: [TaxonomyEntry; 5] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::UnauthorizedBundleAccess),
    entry(ErrorCode::BigPayload),
    (ErrorCode::BadRequest, "Request payload doesn't match the specifications"),
    (ErrorCode::NotFound, "Unable to resolve requested oid"),
];

const CHECK_BUNDLE_ERRORS: [TaxonomyEntry; 3] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::UnauthorizedBundleAccess),
    (ErrorCode::NotFound, "Uploaded bundle has expired"),
];

const EXTEND_BUNDLE_ERRORS: [TaxonomyEntry; 5] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::BigPayload),
    (ErrorCode::BadRequest, "Bad request"),
    (ErrorCode::UnauthorizedBundleAccess, "Unauthorized access to parent bundle"),
    (ErrorCode::NotFound, "Parent bundle has expired"),
];

const GET_ANALYSIS_ERRORS: [TaxonomyEntry; 5] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::UnauthorizedBundleAccess),
    entry(ErrorCode::NotFound),
    entry(ErrorCode::BadRequest),
    (ErrorCode::ServerError, "Getting analysis failed"),
];

const REPORT_ERRORS: [TaxonomyEntry; 5] = [
    entry(ErrorCode::UnauthorizedUser),
    entry(ErrorCode::UnauthorizedBundleAccess),
    entry(ErrorCode::NotFound),
    entry(ErrorCode::BadRequest),
    (ErrorCode::ServerError, "Getting report failed"),
];

/// The closed set of codes one operation may report, with default messages.
///
/// Built from the generic table (passed by value) plus an operation-specific
/// table. Specific entries take precedence, so an operation can reword a
/// generic code (e.g. `getAnalysis` rewords 500).
#[derive(Debug, Clone, Copy)]
pub struct ErrorTaxonomy {
    generic: [TaxonomyEntry; 6],
    specific: &'static [TaxonomyEntry],
}

impl ErrorTaxonomy {
    /// Combines a generic table with an operation-specific one.
    pub const fn new(generic: [TaxonomyEntry; 6], specific: &'static [TaxonomyEntry]) -> Self {
        Self { generic, specific }
    }

    /// Returns the default message for `code`, or `None` if undeclared.
    pub fn message(&self, code: ErrorCode) -> Option<&'static str> {
        self.specific
            .iter()
            .chain(self.generic.iter())
            .find(|(c, _)| *c == code)
            .map(|(_, message)| *message)
    }

    /// Returns `true` if `code` is declared.
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.message(code).is_some()
    }

    /// Resolves a raw wire status, returning `None` if it is unknown or not
    /// declared here.
    pub fn declared(&self, status: u16) -> Option<ErrorCode> {
        ErrorCode::from_u16(status).filter(|code| self.contains(*code))
    }

    /// Returns every declared code, sorted and deduplicated.
    pub fn codes(&self) -> Vec<ErrorCode> {
        let mut codes: Vec<ErrorCode> = self
            .specific
            .iter()
            .chain(self.generic.iter())
            .map(|(c, _)| *c)
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Every remote operation; keys the taxonomy table and names error origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    CheckSession,
    #[serde(rename = "filters")]
    GetFilters,
    CreateBundle,
    CheckBundle,
    ExtendBundle,
    GetAnalysis,
    InitReport,
    GetReport,
    InitScmReport,
    GetScmReport,
}

impl Operation {
    /// Every operation.
    pub const ALL: [Operation; 10] = [
        Operation::CheckSession,
        Operation::GetFilters,
        Operation::CreateBundle,
        Operation::CheckBundle,
        Operation::ExtendBundle,
        Operation::GetAnalysis,
        Operation::InitReport,
        Operation::GetReport,
        Operation::InitScmReport,
        Operation::GetScmReport,
    ];

    /// Name reported in [`ApiError::api_name`] and logs.
    pub const fn api_name(self) -> &'static str {
        match self {
            Operation::CheckSession => "checkSession",
            Operation::GetFilters => "filters",
            Operation::CreateBundle => "createBundle",
            Operation::CheckBundle => "checkBundle",
            Operation::ExtendBundle => "extendBundle",
            Operation::GetAnalysis => "getAnalysis",
            Operation::InitReport => "initReport",
            Operation::GetReport => "getReport",
            Operation::InitScmReport => "initScmReport",
            Operation::GetScmReport => "getScmReport",
        }
    }

    /// The codes this operation may report.
    pub const fn taxonomy(self) -> ErrorTaxonomy {
        let specific: &'static [TaxonomyEntry] = match self {
            Operation::CheckSession => &CHECK_SESSION_ERRORS,
            Operation::GetFilters => &[],
            Operation::CreateBundle => &CREATE_BUNDLE_ERRORS,
            Operation::CheckBundle => &CHECK_BUNDLE_ERRORS,
            Operation::ExtendBundle => &EXTEND_BUNDLE_ERRORS,
            Operation::GetAnalysis => &GET_ANALYSIS_ERRORS,
            Operation::InitReport
            | Operation::GetReport
            | Operation::InitScmReport
            | Operation::GetScmReport => &REPORT_ERRORS,
        };
        ErrorTaxonomy::new(GENERIC_ERRORS, specific)
    }

    /// Total attempts the request executor may spend on one call.
    ///
    /// Reads are retried; anything with a server-side effect gets exactly one
    /// attempt so a retry can never duplicate it. `getAnalysis` is a POST but
    /// only reads the analysis of an existing bundle. `getFilters` takes its
    /// budget from the caller instead.
    pub const fn max_attempts(self) -> u32 {
        match self {
            Operation::GetFilters
            | Operation::CheckBundle
            | Operation::GetAnalysis
            | Operation::GetReport
            | Operation::GetScmReport => MAX_RETRY_ATTEMPTS,
            Operation::CheckSession
            | Operation::CreateBundle
            | Operation::ExtendBundle
            | Operation::InitReport
            | Operation::InitScmReport => 1,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

// ---------------------------------------------------------------------------
// Error results
// ---------------------------------------------------------------------------

/// The error half of [`ApiResult`].
///
/// Fields are private: the only ways to obtain one are [`build_error`] (which
/// enforces the taxonomy) and [`ApiError::local`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{api_name} failed with {status_code}: {status_text}")]
pub struct ApiError {
    status_code: ErrorCode,
    status_text: String,
    api_name: Operation,
    #[serde(skip)]
    local: bool,
}

impl ApiError {
    /// A pre-flight failure detected before any request was sent.
    ///
    /// Always [`ErrorCode::BadRequest`]; exempt from the taxonomy check because
    /// it does not originate from the service.
    pub fn local(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            status_code: ErrorCode::BadRequest,
            status_text: message.into(),
            api_name: operation,
            local: true,
        }
    }

    /// The status code.
    pub fn status_code(&self) -> ErrorCode {
        self.status_code
    }

    /// The human-readable message.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// The operation that produced this error.
    pub fn api_name(&self) -> Operation {
        self.api_name
    }

    /// `true` if the error was raised locally and no request was sent.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

/// Builds the error result for a failed call.
///
/// The message is `override_message` when given, otherwise the taxonomy's
/// default for `status_code`.
///
/// # Panics
///
/// Panics if `status_code` is unknown or not declared by `operation`'s
/// taxonomy.
#[track_caller]
pub fn build_error(status_code: u16, operation: Operation, override_message: Option<&str>) -> ApiError {
    let taxonomy = operation.taxonomy();
    let message = ErrorCode::from_u16(status_code).and_then(|code| taxonomy.message(code).map(|m| (code, m)));

    let Some((code, default_message)) = message else {
        panic!(
            "{operation} reported status {status_code}, which is outside its declared error taxonomy {:?}",
            taxonomy.codes().iter().map(|c| c.as_u16()).collect::<Vec<_>>()
        );
    };

    ApiError {
        status_code: code,
        status_text: override_message.unwrap_or(default_message).to_string(),
        api_name: operation,
        local: false,
    }
}

// ---------------------------------------------------------------------------
// Infrastructure errors feeding local failures
// ---------------------------------------------------------------------------

/// A request URL could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// The base URL does not parse or is not http(s).
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A gateway host needs an org segment and none (or an invalid one) was given.
    #[error("A valid org is required to route requests through '{host}'")]
    InvalidOrg { host: String },

    /// A path parameter (bundle hash, poll id) is empty or contains reserved characters.
    #[error("Invalid path segment '{segment}'")]
    InvalidPathSegment { segment: String },
}

/// A request payload could not be encoded.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to serialise payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}
