//! check-tcp: a single-shot TCP service health check
//!
//! Connects to a TCP endpoint (optionally over TLS), optionally sends a
//! payload, validates the start of the response, sends a quit command and
//! reports OK, WARNING, CRITICAL or UNKNOWN together with the elapsed time.
//!
//! Features:
//! - Default exchanges for FTP, POP, IMAP and SMTP (plain and TLS variants)
//! - Per-phase I/O deadlines and a bounded response buffer
//! - Response-time warning and critical thresholds
//! - Configuration via CLI arguments or TOML file

mod config;
mod error;
mod escape;
mod exchange;
mod probe;
mod report;
mod service;
mod transport;
mod verdict;

use clap::Parser;
use config::{CliArgs, Config};
use report::Checker;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use verdict::ProbeResult;

fn main() -> ExitCode {
    // Argument errors make clap exit before any probing
    let cli = CliArgs::parse();
    let name = report::check_name(cli.service.as_deref());

    // Load configuration
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => return Checker::new(name, ProbeResult::unknown(e.to_string())).exit(),
    };

    // Initialize logging; stdout is reserved for the status line
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let request = config.probe_request();
    debug!(
        host = %request.hostname,
        port = ?request.exchange.port,
        tls = request.exchange.tls,
        timeout = ?request.timeout,
        max_bytes = request.read_cap(),
        "Starting probe"
    );

    let result = probe::run(&request);
    debug!(status = %result.status, elapsed = ?result.elapsed, "Probe finished");

    Checker::new(config.name, result).exit()
}
