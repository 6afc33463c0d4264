//! Probe error taxonomy.
//!
//! Every failure ends the run. The `Display` text of a [`ProbeError`] is
//! what the monitoring host sees, so underlying causes are carried verbatim.

use std::fmt;
use std::io;

/// Failure to establish a (TLS) connection.
#[derive(Debug)]
pub enum TransportError {
    /// Neither the user nor the selected service supplied a port.
    MissingPort { host: String },
    /// Host name could not be resolved to any address.
    Resolve { address: String, source: io::Error },
    /// TCP connect failed on every resolved address.
    Connect { address: String, source: io::Error },
    /// Host name is not usable as a TLS server name.
    ServerName { host: String, reason: String },
    /// TLS client setup failed.
    Tls(rustls::Error),
    /// TLS handshake failed.
    Handshake { address: String, source: io::Error },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::MissingPort { host } => {
                write!(f, "dial tcp {host}: missing port (use --port or a known --service)")
            }
            TransportError::Resolve { address, source } => {
                write!(f, "dial tcp {address}: lookup failed: {source}")
            }
            TransportError::Connect { address, source } => {
                write!(f, "dial tcp {address}: connect: {source}")
            }
            TransportError::ServerName { host, reason } => {
                write!(f, "tls: invalid server name '{host}': {reason}")
            }
            TransportError::Tls(e) => write!(f, "tls: {e}"),
            TransportError::Handshake { address, source } => {
                write!(f, "tls handshake with {address}: {source}")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Resolve { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Handshake { source, .. } => Some(source),
            TransportError::Tls(e) => Some(e),
            TransportError::MissingPort { .. } | TransportError::ServerName { .. } => None,
        }
    }
}

impl From<rustls::Error> for TransportError {
    fn from(e: rustls::Error) -> Self {
        TransportError::Tls(e)
    }
}

/// Which write phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Send,
    Quit,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePhase::Send => write!(f, "send"),
            WritePhase::Quit => write!(f, "quit"),
        }
    }
}

/// Terminal failure of a probe run.
#[derive(Debug)]
pub enum ProbeError {
    Connect(TransportError),
    Write { phase: WritePhase, source: io::Error },
    Read(io::Error),
    /// Response did not start with the expected prefix. Holds the full response.
    UnexpectedResponse(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Connect(e) => write!(f, "{e}"),
            ProbeError::Write { phase, source } => write!(f, "{phase}: write: {source}"),
            ProbeError::Read(e) => write!(f, "receive: read: {e}"),
            ProbeError::UnexpectedResponse(response) => {
                write!(f, "Unexpected response from host/socket: {response}")
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Connect(e) => Some(e),
            ProbeError::Write { source, .. } => Some(source),
            ProbeError::Read(e) => Some(e),
            ProbeError::UnexpectedResponse(_) => None,
        }
    }
}

impl From<TransportError> for ProbeError {
    fn from(e: TransportError) -> Self {
        ProbeError::Connect(e)
    }
}
