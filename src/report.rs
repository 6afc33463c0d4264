//! Monitoring-host output: one status line on stdout plus an exit code.
//!
//! Exit codes follow the common plugin convention:
//! OK=0, WARNING=1, CRITICAL=2, UNKNOWN=3.

use std::process::ExitCode;

use crate::service::normalize_name;
use crate::verdict::{ProbeResult, Status};

/// Check name used when no service is selected.
pub const DEFAULT_CHECK_NAME: &str = "TCP";

/// Name reported for the check: the upper-cased service, or `TCP`.
pub fn check_name(service: Option<&str>) -> String {
    match service.map(normalize_name) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_CHECK_NAME.to_string(),
    }
}

/// Process exit code for a status.
pub fn exit_code(status: Status) -> u8 {
    match status {
        Status::Ok => 0,
        Status::Warning => 1,
        Status::Critical => 2,
        Status::Unknown => 3,
    }
}

/// A named probe result ready to be reported.
#[derive(Debug)]
pub struct Checker {
    name: String,
    result: ProbeResult,
}

impl Checker {
    pub fn new(name: impl Into<String>, result: ProbeResult) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }

    /// `"<NAME> <STATUS>: <message>"`
    pub fn line(&self) -> String {
        format!("{} {}: {}", self.name, self.result.status, self.result.message)
    }

    /// Print the status line and hand back the matching exit code.
    pub fn exit(self) -> ExitCode {
        println!("{}", self.line());
        ExitCode::from(exit_code(self.result.status))
    }
}
