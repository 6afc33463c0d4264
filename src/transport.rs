//! Plain and TLS client connections with deadline-bounded I/O.
//!
//! A [`Deadline`] is an absolute point in time. Before each blocking call
//! the socket timeout is re-armed with whatever time is left, so several
//! reads in one phase share a single budget.

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::TransportError;

/// Absolute deadline for a blocking phase. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Deadline `timeout` from now, or unbounded when `timeout` is `None`.
    ///
    /// A timeout too large to represent as an `Instant` is unbounded.
    pub fn after(timeout: Option<Duration>) -> Self {
        match timeout.and_then(|t| Instant::now().checked_add(t)) {
            Some(at) => Deadline(Some(at)),
            None => Self::unbounded(),
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Deadline(None)
    }

    /// Time left before the deadline.
    ///
    /// Returns a `TimedOut` error once the deadline has passed, because a
    /// zero socket timeout would mean "block forever" to the OS.
    pub fn remaining(&self) -> io::Result<Option<Duration>> {
        match self.0 {
            None => Ok(None),
            Some(at) => {
                let left = at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(timed_out())
                } else {
                    Ok(Some(left))
                }
            }
        }
    }
}

/// Error reported when a deadline expires.
pub fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o timeout")
}

/// Normalize the platform-specific error a socket timeout produces.
///
/// Unix reports an expired `SO_RCVTIMEO`/`SO_SNDTIMEO` as `WouldBlock`.
pub fn map_timeout(e: io::Error) -> io::Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => timed_out(),
        _ => e,
    }
}

/// An established connection to the probed service.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    fn socket(&self) -> &TcpStream {
        match self {
            Connection::Plain(sock) => sock,
            Connection::Tls(stream) => &stream.sock,
        }
    }

    /// Whether the connection is TLS-wrapped.
    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Bound the next reads by `deadline`.
    pub fn arm_read(&self, deadline: Deadline) -> io::Result<()> {
        self.socket().set_read_timeout(deadline.remaining()?)
    }

    /// Bound the next writes by `deadline`.
    ///
    /// TLS writes may also read (alerts, key updates), so both directions
    /// are armed.
    pub fn arm_write(&self, deadline: Deadline) -> io::Result<()> {
        let remaining = deadline.remaining()?;
        self.socket().set_write_timeout(remaining)?;
        if self.is_tls() {
            self.socket().set_read_timeout(remaining)?;
        }
        Ok(())
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(sock) => sock.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(sock) => sock.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(sock) => sock.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Connection::Tls(stream) = self {
            stream.conn.send_close_notify();
            // Best effort: the peer may already be gone.
            let _ = stream.conn.write_tls(&mut stream.sock);
        }
        let _ = self.socket().shutdown(Shutdown::Both);
        trace!("Connection closed");
    }
}

/// Format `host:port`, bracketing IPv6 literals.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Connect to `host:port`, optionally wrapping the stream in TLS.
///
/// The TCP connect and the TLS handshake are both bounded by `timeout`.
pub fn dial(
    host: &str,
    port: Option<u16>,
    tls: bool,
    timeout: Option<Duration>,
) -> Result<Connection, TransportError> {
    let port = port.ok_or_else(|| TransportError::MissingPort {
        host: host.to_string(),
    })?;
    let address = host_port(host, port);
    let deadline = Deadline::after(timeout);

    debug!(%address, tls, ?timeout, "Dialing");
    let sock = connect_any(host, port, &address, deadline)?;

    if !tls {
        return Ok(Connection::Plain(sock));
    }

    let stream = handshake(host, sock, &address, deadline)?;
    Ok(Connection::Tls(Box::new(stream)))
}

/// Try every resolved address in order; report the last failure.
fn connect_any(
    host: &str,
    port: u16,
    address: &str,
    deadline: Deadline,
) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses found");
    for addr in addrs {
        let result = deadline
            .remaining()
            .and_then(|remaining| connect_socket(addr, remaining));
        match result {
            Ok(sock) => {
                debug!(peer = %addr, "Connected");
                return Ok(sock);
            }
            Err(e) => {
                debug!(peer = %addr, error = %e, "Connect attempt failed");
                last_err = e;
            }
        }
    }

    Err(TransportError::Connect {
        address: address.to_string(),
        source: last_err,
    })
}

fn connect_socket(addr: SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    match timeout {
        Some(t) => socket.connect_timeout(&addr.into(), t).map_err(map_timeout)?,
        None => socket.connect(&addr.into())?,
    }
    socket.set_nodelay(true)?;

    Ok(socket.into())
}

/// Client configuration trusting the system root store.
fn tls_config() -> Result<Arc<ClientConfig>, TransportError> {
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!(error = %e, "Failed to load a system root certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "Loaded system root certificates");

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

    Ok(Arc::new(config))
}

fn handshake(
    host: &str,
    mut sock: TcpStream,
    address: &str,
    deadline: Deadline,
) -> Result<StreamOwned<ClientConnection, TcpStream>, TransportError> {
    let server_name = ServerName::try_from(host)
        .map_err(|e| TransportError::ServerName {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .to_owned();

    let mut conn = ClientConnection::new(tls_config()?, server_name)?;

    let handshake_err = |source: io::Error| TransportError::Handshake {
        address: address.to_string(),
        source,
    };

    while conn.is_handshaking() {
        let remaining = deadline.remaining().map_err(handshake_err)?;
        sock.set_read_timeout(remaining).map_err(handshake_err)?;
        sock.set_write_timeout(remaining).map_err(handshake_err)?;
        conn.complete_io(&mut sock)
            .map_err(|e| handshake_err(map_timeout(e)))?;
    }

    debug!(
        %address,
        version = ?conn.protocol_version(),
        "TLS handshake complete"
    );

    Ok(StreamOwned::new(conn, sock))
}
