//! Endpoint session over a DPDK telemetry socket.
//!
//! The telemetry socket is a Unix `SOCK_SEQPACKET` socket: every `recv` returns
//! exactly one message. On connect the endpoint sends a JSON handshake carrying
//! `max_output_len`, the upper bound for every later response. Requests are
//! plain command strings such as `/ethdev/stats,0`; responses are JSON objects
//! keyed by the command path without its parameters.
//!
//! The socket is non-blocking and registered with the tokio reactor, so every
//! read and write is an await point that shutdown can interrupt.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::socket::{self, AddressFamily, MsgFlags, SockFlag, SockType, UnixAddr};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::unix::AsyncFd;
use tracing::{debug, trace};

use crate::error::{Result, TelemetryError};

/// Socket file created by a DPDK application inside its runtime directory.
pub const DEFAULT_SOCKET_NAME: &str = "dpdk_telemetry.v2";

/// Buffer used for the initial handshake message.
pub const HANDSHAKE_BUFFER_LEN: usize = 1024;

/// Largest `max_output_len` accepted from a handshake. Responses are read into
/// a buffer of this size, so the peer must not pick it freely.
pub const MAX_OUTPUT_LEN_LIMIT: usize = 1024 * 1024;

const HANDSHAKE: &str = "handshake";

/// Initial message sent by the endpoint right after accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub pid: Option<i64>,
    pub max_output_len: usize,
}

impl Handshake {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let handshake: Handshake = serde_json::from_slice(bytes)
            .map_err(|e| TelemetryError::protocol(HANDSHAKE, e))?;
        if handshake.max_output_len == 0 {
            return Err(TelemetryError::protocol(HANDSHAKE, "max_output_len is zero"));
        }
        if handshake.max_output_len > MAX_OUTPUT_LEN_LIMIT {
            return Err(TelemetryError::protocol(
                HANDSHAKE,
                format!(
                    "max_output_len {} exceeds limit of {MAX_OUTPUT_LEN_LIMIT} bytes",
                    handshake.max_output_len
                ),
            ));
        }
        Ok(handshake)
    }
}

struct Connection {
    fd: AsyncFd<OwnedFd>,
    handshake: Handshake,
}

/// One connection to one telemetry endpoint.
///
/// A session never reconnects on its own. Any command failure leaves the
/// connection in an unknown state; callers close and reconnect.
pub struct Session {
    path: PathBuf,
    io_timeout: Duration,
    conn: Option<Connection>,
}

impl Session {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            io_timeout,
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        self.conn.as_ref().map(|c| &c.handshake)
    }

    /// Negotiated maximum response size of the current connection.
    pub fn max_output_len(&self) -> Option<usize> {
        self.handshake().map(|h| h.max_output_len)
    }

    /// Opens the socket and reads the handshake.
    ///
    /// Any previous connection is closed first.
    pub async fn connect(&mut self) -> Result<&Handshake> {
        self.close();

        let fd = socket::socket(
            AddressFamily::Unix,
            SockType::SeqPacket,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(|e| TelemetryError::connection(&self.path, e))?;

        let addr = UnixAddr::new(self.path.as_path())
            .map_err(|e| TelemetryError::connection(&self.path, e))?;
        socket::connect(fd.as_raw_fd(), &addr)
            .map_err(|e| TelemetryError::connection(&self.path, e))?;

        let fd = AsyncFd::new(fd).map_err(|e| TelemetryError::connection(&self.path, e))?;

        let mut buf = vec![0u8; HANDSHAKE_BUFFER_LEN];
        let len = tokio::time::timeout(self.io_timeout, recv_message(&fd, &mut buf))
            .await
            .map_err(|_| TelemetryError::connection(&self.path, "timed out waiting for handshake"))?
            .map_err(|e| {
                TelemetryError::connection(&self.path, format!("handshake read failed: {e}"))
            })?;

        if len == 0 {
            return Err(TelemetryError::connection(
                &self.path,
                "peer closed before sending the handshake",
            ));
        }
        if len > buf.len() {
            return Err(TelemetryError::protocol(
                HANDSHAKE,
                format!("handshake of {len} bytes exceeds {HANDSHAKE_BUFFER_LEN} bytes"),
            ));
        }

        let handshake = Handshake::parse(&buf[..len])?;
        debug!(
            path = %self.path.display(),
            max_output_len = handshake.max_output_len,
            version = handshake.version.as_deref().unwrap_or("unknown"),
            "Telemetry socket connected"
        );

        let conn = self.conn.insert(Connection { fd, handshake });
        Ok(&conn.handshake)
    }

    /// Sends `request` and returns the raw response bytes.
    pub async fn command_raw(&mut self, request: &str) -> Result<Vec<u8>> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            TelemetryError::io(
                request,
                io::Error::new(io::ErrorKind::NotConnected, "session is not connected"),
            )
        })?;
        let max_len = conn.handshake.max_output_len;

        let exchange = async {
            let sent = send_message(&conn.fd, request.as_bytes())
                .await
                .map_err(|e| TelemetryError::io(request, e))?;
            if sent != request.len() {
                return Err(TelemetryError::io(
                    request,
                    io::Error::new(io::ErrorKind::WriteZero, "short write"),
                ));
            }

            let mut buf = vec![0u8; max_len];
            let len = recv_message(&conn.fd, &mut buf)
                .await
                .map_err(|e| TelemetryError::io(request, e))?;
            if len > max_len {
                return Err(TelemetryError::protocol(
                    request,
                    format!("response of {len} bytes exceeds max_output_len {max_len}"),
                ));
            }
            buf.truncate(len);
            Ok(buf)
        };

        let response = tokio::time::timeout(self.io_timeout, exchange)
            .await
            .map_err(|_| {
                TelemetryError::io(
                    request,
                    io::Error::new(io::ErrorKind::TimedOut, "no response before timeout"),
                )
            })??;

        trace!(request = %request, bytes = response.len(), "Telemetry command answered");
        Ok(response)
    }

    /// Sends `request` and returns the value keyed by its command path.
    pub async fn command(&mut self, request: &str) -> Result<Value> {
        let raw = self.command_raw(request).await?;
        parse_response(request, &raw)
    }

    /// Releases the connection. Safe to call repeatedly or before any connect.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!(path = %self.path.display(), "Telemetry socket closed");
        }
    }
}

/// Extracts the value a response carries for `request`.
///
/// The response key is the command path, i.e. the part of the request before
/// the first comma: `/ethdev/stats,3` is answered as `{"/ethdev/stats": ...}`.
pub fn parse_response(request: &str, raw: &[u8]) -> Result<Value> {
    if raw.is_empty() {
        return Err(TelemetryError::protocol(request, "empty response"));
    }

    let parsed: Value =
        serde_json::from_slice(raw).map_err(|e| TelemetryError::protocol(request, e))?;
    let Value::Object(mut object) = parsed else {
        return Err(TelemetryError::protocol(request, "response is not a JSON object"));
    };

    let key = command_path(request);
    match object.remove(key) {
        None | Some(Value::Null) => Err(TelemetryError::protocol(
            request,
            format!("response has no value for '{key}'"),
        )),
        Some(value) => Ok(value),
    }
}

fn command_path(request: &str) -> &str {
    request.split(',').next().unwrap_or(request)
}

async fn recv_message(fd: &AsyncFd<OwnedFd>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = fd.readable().await?;
        // MSG_TRUNC makes the kernel report the full message length, so an
        // oversized message is detected instead of silently cut.
        match guard.try_io(|inner| {
            socket::recv(inner.get_ref().as_raw_fd(), &mut buf[..], MsgFlags::MSG_TRUNC)
                .map_err(io::Error::from)
        }) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

async fn send_message(fd: &AsyncFd<OwnedFd>, data: &[u8]) -> io::Result<usize> {
    loop {
        let mut guard = fd.writable().await?;
        match guard.try_io(|inner| {
            socket::send(inner.get_ref().as_raw_fd(), data, MsgFlags::MSG_NOSIGNAL)
                .map_err(io::Error::from)
        }) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}
