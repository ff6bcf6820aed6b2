//! Clients for the code analysis service.
//!
//! This crate provides the four clients a caller strings together: the
//! [`SessionBroker`] for browser logins, the [`BundleClient`] for uploads, the
//! [`AnalysisClient`] and the [`ReportClient`] for results.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Clients sequence calls between the protocol rules
//! in the [`protocol`] crate and the [`protocol::RequestExecutor`] /
//! [`protocol::PayloadEncoder`] ports. They contain no transport code.
//!
//! ## Calling Convention
//!
//! Every operation is one request. Nothing here schedules retries beyond the
//! executor's per-operation attempt budget, runs timers, or loops: polling
//! cadence, cancellation and overall timeouts belong to the caller. Expected
//! failures are returned as [`protocol::ApiError`]; the only panic is a status
//! that falls outside the operation's declared taxonomy.

mod dispatch;

pub mod analysis;
pub mod bundle;
pub mod report;
pub mod session;

pub use analysis::AnalysisClient;
pub use bundle::BundleClient;
pub use report::ReportClient;
pub use session::SessionBroker;
