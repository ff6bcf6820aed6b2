//! Transport settings.

use std::time::Duration;

use protocol::REQUEST_RETRY_DELAY;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for [`crate::HttpExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on a single attempt, including reading the body.
    pub request_timeout: Duration,
    /// Pause between attempts when the server does not ask for a specific one.
    pub retry_delay: Duration,
    /// Value of the `user-agent` header.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_delay: REQUEST_RETRY_DELAY,
            user_agent: concat!("khulnasoft-code-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert!(config.user_agent.starts_with("khulnasoft-code-client/"));
    }
}
