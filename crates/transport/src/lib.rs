//! Infrastructure adapters for the code analysis client.
//!
//! Implements [`protocol::RequestExecutor`] over reqwest and
//! [`protocol::PayloadEncoder`] over flate2 + base64.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, attempt budgeting, back-off and
//! network error classification live here. The `clients` crate sees only the
//! two port traits and never learns which HTTP stack is in use.
//!
//! ## Failure Mapping
//!
//! | Condition | Reported `error_code` |
//! |-----------|-----------------------|
//! | Declared HTTP status | the status itself |
//! | Undeclared 5xx | 500 |
//! | Any other undeclared status | 400 |
//! | Request timed out | 504 |
//! | Host name did not resolve | 452 |
//! | Connection refused | 421 |
//! | Any other network failure | 503 |

mod config;
mod encoder;
mod error;
mod executor;

pub use config::{TransportConfig, DEFAULT_REQUEST_TIMEOUT};
pub use encoder::GzipPayloadEncoder;
pub use error::TransportError;
pub use executor::HttpExecutor;
