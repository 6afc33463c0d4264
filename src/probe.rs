//! The probe exchange: delay, dial, send, receive, validate, quit.
//!
//! Every phase is optional and gated by its payload being non-empty. The
//! first failing phase ends the run with a CRITICAL result; nothing is
//! retried. The connection is owned by [`exchange`] and closed when it
//! returns, whichever way it returns.

use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{ProbeError, WritePhase};
use crate::exchange::ResolvedExchange;
use crate::transport::{self, map_timeout, Connection, Deadline};
use crate::verdict::{self, ProbeResult, Thresholds};

/// Response size cap used when none is configured.
pub const DEFAULT_MAX_BYTES: usize = 32 * 1024;

/// Everything needed for one probe run.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub hostname: String,
    pub exchange: ResolvedExchange,
    /// Per-phase I/O deadline. `None` blocks indefinitely.
    pub timeout: Option<Duration>,
    /// Response size cap; 0 selects [`DEFAULT_MAX_BYTES`].
    pub max_bytes: usize,
    /// Hold-off before dialing. Counted in the elapsed time.
    pub delay: Duration,
    pub thresholds: Thresholds,
}

impl ProbeRequest {
    /// Effective response size cap.
    pub fn read_cap(&self) -> usize {
        if self.max_bytes > 0 {
            self.max_bytes
        } else {
            DEFAULT_MAX_BYTES
        }
    }
}

/// Outcome of a successful exchange.
#[derive(Debug)]
struct Exchanged {
    elapsed: Duration,
    response: String,
}

/// Run the probe and judge the result.
pub fn run(request: &ProbeRequest) -> ProbeResult {
    let start = Instant::now();

    match exchange(request, start) {
        Ok(done) => verdict::evaluate(
            done.elapsed,
            &request.thresholds,
            &request.hostname,
            request.exchange.port.unwrap_or_default(),
            &done.response,
        ),
        Err(e) => {
            warn!(error = %e, "Probe failed");
            ProbeResult::critical(start.elapsed(), e.to_string())
        }
    }
}

fn exchange(request: &ProbeRequest, start: Instant) -> Result<Exchanged, ProbeError> {
    let ex = &request.exchange;

    if !request.delay.is_zero() {
        debug!(delay = ?request.delay, "Waiting before connecting");
        thread::sleep(request.delay);
    }

    let mut conn = transport::dial(&request.hostname, ex.port, ex.tls, request.timeout)?;

    if !ex.send.is_empty() {
        debug!(bytes = ex.send.len(), "Sending payload");
        write_payload(&mut conn, &ex.send, request.timeout, WritePhase::Send)?;
    }

    let mut response = String::new();
    if !ex.expect.is_empty() {
        debug!(expect = %ex.expect, cap = request.read_cap(), "Waiting for response");
        let deadline = Deadline::after(request.timeout);
        let buf = slurp(&mut conn, request.read_cap(), deadline).map_err(ProbeError::Read)?;
        response = String::from_utf8_lossy(&buf).into_owned();

        if !response.starts_with(ex.expect.as_str()) {
            return Err(ProbeError::UnexpectedResponse(response));
        }
    }

    if !ex.quit.is_empty() {
        debug!(bytes = ex.quit.len(), "Sending quit payload");
        write_payload(&mut conn, &ex.quit, request.timeout, WritePhase::Quit)?;
    }

    Ok(Exchanged {
        elapsed: start.elapsed(),
        response,
    })
}

/// Write `payload` in full before the phase deadline.
fn write_payload(
    conn: &mut Connection,
    payload: &[u8],
    timeout: Option<Duration>,
    phase: WritePhase,
) -> Result<(), ProbeError> {
    let deadline = Deadline::after(timeout);
    conn.arm_write(deadline)
        .and_then(|()| conn.write_all(payload))
        .and_then(|()| conn.flush())
        .map_err(|e| ProbeError::Write {
            phase,
            source: map_timeout(e),
        })
}

/// Accumulate a response of at most `cap` bytes.
///
/// Each read is offered all of the remaining capacity. Stops after the
/// first short read or once `cap` bytes are held. A peer that closes
/// before sending anything is an error.
fn slurp<C: Readable>(conn: &mut C, cap: usize, deadline: Deadline) -> io::Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(cap);

    while buf.len() < cap {
        let start = buf.len();
        let want = cap - start;
        conn.arm(deadline)?;

        buf.resize(cap, 0);
        let n = match conn.read(&mut buf[start..]) {
            Ok(n) => n,
            Err(e) => {
                buf.truncate(start);
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(map_timeout(e));
            }
        };
        buf.truncate(start + n);
        trace!(n, total = buf.len(), "Read chunk");

        if n == 0 && start == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before any response data",
            ));
        }

        if n < want {
            break;
        }
    }

    Ok(buf)
}

/// A reader whose blocking reads can be bounded by a deadline.
trait Readable: Read {
    fn arm(&self, deadline: Deadline) -> io::Result<()>;
}

impl Readable for Connection {
    fn arm(&self, deadline: Deadline) -> io::Result<()> {
        self.arm_read(deadline)
    }
}
