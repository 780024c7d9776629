//! Error kinds raised while talking to a telemetry endpoint.
//!
//! Every error here is local to one endpoint's poller. None of them is fatal to
//! the process: the poller closes its session, waits out the backoff delay and
//! reconnects.

use std::io;
use std::path::PathBuf;

use crate::telemetry::PortId;

/// Errors produced by the session, enumerator, sampler and poller.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Socket absent, connection refused or handshake read failed.
    #[error("failed to connect to {path}: {reason}")]
    Connection { path: PathBuf, reason: String },

    /// Malformed handshake or command response.
    #[error("protocol error on '{command}': {reason}")]
    Protocol { command: String, reason: String },

    /// Write or read failure on an established connection.
    #[error("io error on '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    /// One per-port command failed mid-pass; the whole pass is discarded.
    #[error("sampling '{command}' failed on port {port}: {source}")]
    PartialSample {
        command: String,
        port: PortId,
        #[source]
        source: Box<TelemetryError>,
    },

    /// Shutdown was requested.
    #[error("cancelled")]
    Cancelled,
}

impl TelemetryError {
    pub(crate) fn connection(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TelemetryError::Connection {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(command: impl Into<String>, reason: impl ToString) -> Self {
        TelemetryError::Protocol {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(command: impl Into<String>, source: io::Error) -> Self {
        TelemetryError::Io {
            command: command.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind, used in logs and status.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryError::Connection { .. } => "connection",
            TelemetryError::Protocol { .. } => "protocol",
            TelemetryError::Io { .. } => "io",
            TelemetryError::PartialSample { .. } => "partial_sample",
            TelemetryError::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TelemetryError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
