use thiserror::Error;

/// Failures while setting up the transport. Request failures are never
/// reported here; they travel back through [`protocol::ExecutorResponse`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}
