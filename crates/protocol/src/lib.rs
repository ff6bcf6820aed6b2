//! Protocol domain for the code analysis service client.
//!
//! This crate contains every wire concept, newtype identifier, error taxonomy,
//! and port trait used by the clients. Infrastructure crates implement the
//! ports defined here; they never add protocol rules.
//!
//! ## Architectural Layer
//!
//! **Protocol rules + port definitions.** This crate has no I/O dependencies.
//! It defines *what* a request looks like and *how* a failure is classified;
//! infrastructure crates define how bytes are moved.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`BundleHash`, `DraftToken`, `PollId`, etc.) |
//! | [`errors`] | `ErrorCode`, per-operation taxonomies, `ApiError`, `build_error` |
//! | [`context`] | `ConnectionContext` and the common request headers |
//! | [`types`] | Wire value types (`RemoteBundle`, `PollResponse`, options) |
//! | [`payloads`] | Field-by-field request body builders |
//! | [`urls`] | Endpoint URL construction and validation |
//! | [`ports`] | `RequestExecutor` and `PayloadEncoder` traits |

pub mod context;
pub mod errors;
pub mod identifiers;
pub mod payloads;
pub mod ports;
pub mod types;
pub mod urls;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use context::{ConnectionContext, ORG_NAME_HEADER, REQUEST_ID_HEADER};
pub use errors::{
    build_error, ApiError, ApiResult, EncodeError, ErrorCode, ErrorTaxonomy, Operation, RetryPolicy,
    TaxonomyEntry, UnknownErrorCode, UrlError, GENERIC_ERRORS, MAX_PAYLOAD, MAX_RETRY_ATTEMPTS,
    REQUEST_RETRY_DELAY,
};
pub use identifiers::{BundleHash, DraftToken, OrgName, PollId, ReportId, Source, TestId};
pub use ports::{
    ExecutorResponse, Headers, HttpBody, HttpMethod, HttpRequest, IpFamily, PayloadEncoder,
    RequestExecutor,
};
pub use types::{
    AnalysisContext, AnalysisOptions, AnalysisResponse, AnalysisStatus, ApiTokenResponse, BundleFile,
    BundleFiles, InitReportResponse, InitScmReportResponse, Initiator, PollResponse, ProjectContext,
    RemoteBundle, ReportOptions, ReportResponse, ScmReportOptions, SessionRecord, SupportedFiles,
};
