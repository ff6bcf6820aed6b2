//! Code analysis client CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** from flags and `KHULNASOFT_*` environment
//!    variables, then validate it.
//! 2. **Wire observability**: `tracing-subscriber` with an env filter, text or
//!    JSON output, and an optional OpenTelemetry OTLP exporter. All `tracing`
//!    spans and events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: the reqwest [`transport::HttpExecutor`] and
//!    the [`transport::GzipPayloadEncoder`], injected into the clients.
//! 4. **Run the selected command**, owning the poll cadence and overall
//!    timeout that the clients deliberately leave to their caller.

mod commands;
mod config;
mod files;
mod telemetry;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use transport::{GzipPayloadEncoder, HttpExecutor};

use crate::commands::Services;
use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let telemetry = telemetry::init(&args)?;

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        telemetry.shutdown();
        std::process::exit(2);
    }
    info!(api_host = %args.api_host, source = %args.source, "starting");

    let executor = Arc::new(HttpExecutor::new(args.transport_config())?);
    let services = Services::new(executor, Arc::new(GzipPayloadEncoder::new()));

    let result = commands::run(&args, &services).await;
    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    telemetry.shutdown();
    result
}
