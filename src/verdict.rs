//! Health verdict from elapsed time and the validated response.

use std::fmt;
use std::time::Duration;

/// Check status understood by the monitoring host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Response-time thresholds. `None` disables a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: Option<Duration>,
    pub critical: Option<Duration>,
}

impl Thresholds {
    /// Status for a run that took `elapsed`.
    ///
    /// Both thresholds are checked; critical is checked last and wins.
    pub fn status_for(&self, elapsed: Duration) -> Status {
        let mut status = Status::Ok;
        if self.warning.is_some_and(|warning| elapsed > warning) {
            status = Status::Warning;
        }
        if self.critical.is_some_and(|critical| elapsed > critical) {
            status = Status::Critical;
        }
        status
    }
}

/// Final outcome of one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: Status,
    pub elapsed: Duration,
    pub message: String,
}

impl ProbeResult {
    /// Terminal failure raised before threshold evaluation.
    pub fn critical(elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            status: Status::Critical,
            elapsed,
            message: message.into(),
        }
    }

    /// The probe could not be run at all.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            elapsed: Duration::ZERO,
            message: message.into(),
        }
    }
}

/// Judge a completed exchange.
pub fn evaluate(
    elapsed: Duration,
    thresholds: &Thresholds,
    hostname: &str,
    port: u16,
    response: &str,
) -> ProbeResult {
    ProbeResult {
        status: thresholds.status_for(elapsed),
        elapsed,
        message: summary(elapsed, hostname, port, response),
    }
}

/// `"<secs> seconds response time on <host> port <port> [<response>]"`
pub fn summary(elapsed: Duration, hostname: &str, port: u16, response: &str) -> String {
    format!(
        "{:.3} seconds response time on {} port {} [{}]",
        elapsed.as_secs_f64(),
        hostname,
        port,
        response.trim_end_matches(['\r', '\n'])
    )
}
