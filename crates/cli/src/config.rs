//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use protocol::{AnalysisOptions, ConnectionContext, OrgName, Source};
use transport::TransportConfig;

/// Upload code to the analysis service and fetch results.
#[derive(Parser, Debug, Clone)]
#[command(name = "khulnasoft-code", version)]
#[command(about = "Client for the KhulnaSoft code analysis service")]
pub struct Args {
    /// Analysis service base URL
    #[arg(long, env = "KHULNASOFT_API_HOST", default_value = "https://deeproxy.dev.khulnasoft.com")]
    pub api_host: String,

    /// Authentication host used by `login`
    #[arg(long, env = "KHULNASOFT_AUTH_HOST", default_value = "https://dev.khulnasoft.com")]
    pub auth_host: String,

    /// Session token sent as the Authorization header
    #[arg(long, env = "KHULNASOFT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Organization to scope requests to (required for api.* hosts)
    #[arg(long, env = "KHULNASOFT_ORG")]
    pub org: Option<String>,

    /// Identifies the calling tool to the service
    #[arg(long, env = "KHULNASOFT_SOURCE", default_value = "khulnasoft-cli")]
    pub source: String,

    /// Pause between polls in milliseconds
    #[arg(long, env = "KHULNASOFT_POLL_INTERVAL_MS", default_value = "500")]
    pub poll_interval_ms: u64,

    /// Give up polling after this many seconds
    #[arg(long, env = "KHULNASOFT_POLL_TIMEOUT_SECS", default_value = "900")]
    pub poll_timeout_secs: u64,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, env = "KHULNASOFT_REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    /// Pause between retried attempts in milliseconds
    #[arg(long, env = "KHULNASOFT_RETRY_DELAY_MS", default_value = "5000")]
    pub retry_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// OTLP gRPC endpoint for exporting spans (e.g. http://localhost:4317)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in through the browser and print the resulting API token
    Login,

    /// Print the file names and extensions the service accepts
    Filters,

    /// Upload a directory and print its analysis
    Analyze {
        dir: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Upload a directory and run a file-based report
    Report {
        dir: PathBuf,

        #[arg(long)]
        project_name: String,

        #[arg(long)]
        target_name: Option<String>,

        #[arg(long)]
        target_ref: Option<String>,

        #[arg(long)]
        remote_repo_url: Option<String>,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Run a report for a commit of an SCM-imported project
    ScmReport {
        #[arg(long)]
        project_id: String,

        #[arg(long)]
        commit_id: String,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

impl Command {
    fn needs_token(&self) -> bool {
        !matches!(self, Command::Login | Command::Filters)
    }
}

/// Analysis options shared by every command that starts a job.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct AnalysisArgs {
    /// Minimum severity to report (1 = low .. 3 = high)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub severity: Option<u8>,

    /// Ask the service to prioritize results
    #[arg(long)]
    pub prioritized: bool,

    /// Request legacy output
    #[arg(long)]
    pub legacy: bool,

    /// Only report results for these bundle paths
    #[arg(long = "limit-to-file")]
    pub limit_to_files: Vec<String>,

    /// Analysis shard
    #[arg(long)]
    pub shard: Option<String>,
}

impl AnalysisArgs {
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            severity: self.severity,
            prioritized: self.prioritized.then_some(true),
            legacy: self.legacy.then_some(true),
            limit_to_files: self.limit_to_files.clone(),
            shard: self.shard.clone(),
        }
    }
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("--poll-interval-ms must be greater than zero".to_string());
        }
        if self.poll_timeout_secs == 0 {
            return Err("--poll-timeout-secs must be greater than zero".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("--request-timeout-secs must be greater than zero".to_string());
        }
        if self.source.is_empty() {
            return Err("KHULNASOFT_SOURCE must not be empty".to_string());
        }
        if matches!(&self.org, Some(org) if org.is_empty()) {
            return Err("KHULNASOFT_ORG must not be empty when set".to_string());
        }
        if self.command.needs_token() && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err("KHULNASOFT_API_KEY is required for this command (run `login` first)".to_string());
        }
        Ok(())
    }

    pub fn source(&self) -> anyhow::Result<Source> {
        Source::new(self.source.clone()).ok_or_else(|| anyhow::anyhow!("KHULNASOFT_SOURCE must not be empty"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..TransportConfig::default()
        }
    }

    /// Connection settings for authenticated commands.
    pub fn connection_context(&self) -> anyhow::Result<ConnectionContext> {
        let token = self.api_key.clone().unwrap_or_default();
        let context = ConnectionContext::new(self.api_host.clone(), token, self.source()?);
        Ok(match self.org.clone().and_then(OrgName::new) {
            Some(org) => context.with_org(org),
            None => context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("khulnasoft-code").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_point_at_the_dev_service() {
        let args = parse(&["filters"]);
        assert_eq!(args.api_host, "https://deeproxy.dev.khulnasoft.com");
        assert_eq!(args.auth_host, "https://dev.khulnasoft.com");
        assert_eq!(args.source().unwrap().as_str(), "khulnasoft-cli");
        assert_eq!(args.transport_config().retry_delay, Duration::from_secs(5));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn authenticated_commands_need_a_token() {
        let args = parse(&["analyze", "."]);
        assert!(args.validate().unwrap_err().contains("KHULNASOFT_API_KEY"));

        let args = parse(&["--api-key", "t", "analyze", "."]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let args = parse(&["--poll-interval-ms", "0", "login"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn analysis_flags_map_to_options() {
        let args = parse(&[
            "--api-key",
            "t",
            "analyze",
            "src",
            "--severity",
            "2",
            "--prioritized",
            "--limit-to-file",
            "a.js",
        ]);
        let Command::Analyze { analysis, .. } = &args.command else {
            panic!("expected analyze");
        };
        let options = analysis.options();
        assert_eq!(options.severity, Some(2));
        assert_eq!(options.prioritized, Some(true));
        assert_eq!(options.legacy, None);
        assert_eq!(options.limit_to_files, vec!["a.js".to_string()]);
    }

    #[test]
    fn severity_outside_range_is_a_parse_error() {
        let result = Args::try_parse_from(["khulnasoft-code", "analyze", ".", "--severity", "7"]);
        assert!(result.is_err());
    }

    #[test]
    fn org_is_attached_to_the_context() {
        let args = parse(&["--api-key", "t", "--org", "acme", "scm-report", "--project-id", "p", "--commit-id", "c"]);
        let context = args.connection_context().unwrap();
        assert_eq!(context.org().map(|o| o.as_str()), Some("acme"));
    }
}
