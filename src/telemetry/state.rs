//! Shared state published by a poller and read by exposition adapters.
//!
//! Data and status live behind separate locks. Each lock is held only long
//! enough to clone or replace an `Arc`/small struct, so readers never wait on
//! endpoint IO and never see a half-written cycle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rates::RateRecord;
use super::sampler::Sample;
use super::session::Handshake;

/// Lifecycle state of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    Disconnected,
    Connecting,
    Enumerating,
    Sampling,
    Stopped,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PollerState::Disconnected => "disconnected",
            PollerState::Connecting => "connecting",
            PollerState::Enumerating => "enumerating",
            PollerState::Sampling => "sampling",
            PollerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Connection bookkeeping of a poller.
#[derive(Debug, Clone, Serialize)]
pub struct PollerStatus {
    pub state: PollerState,
    /// Successful connects (handshake completed).
    pub connects: u64,
    /// Completed sampling passes.
    pub samples: u64,
    /// Passes that ended in a failure.
    pub failures: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
    pub last_error_kind: Option<&'static str>,
    pub handshake: Option<Handshake>,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for PollerStatus {
    fn default() -> Self {
        Self {
            state: PollerState::Disconnected,
            connects: 0,
            samples: 0,
            failures: 0,
            consecutive_failures: 0,
            last_error: None,
            last_error_kind: None,
            handshake: None,
            last_success: None,
        }
    }
}

/// Result of one completed sampling cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sample: Sample,
    /// Empty until two consecutive samples exist on the current connection.
    pub rates: RateRecord,
    /// Port information captured when the connection was established.
    pub port_info: Option<Arc<Sample>>,
    /// Cycle number on the current connection, starting at 1.
    pub cycle: u64,
    pub published_at: DateTime<Utc>,
}

/// Per-endpoint shared state. Written by exactly one poller.
#[derive(Debug)]
pub struct EndpointState {
    name: String,
    path: PathBuf,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<PollerStatus>,
}

impl EndpointState {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            snapshot: RwLock::new(None),
            status: RwLock::new(PollerStatus::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the published snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Drops the published rates while keeping the last sample.
    pub fn clear_rates(&self) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = guard.as_ref() {
            if !current.rates.is_empty() {
                let mut cleared = Snapshot::clone(current);
                cleared.rates = RateRecord::default();
                *guard = Some(Arc::new(cleared));
            }
        }
    }

    /// Last published snapshot, if any cycle ever completed.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> PollerStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_status(&self, update: impl FnOnce(&mut PollerStatus)) {
        update(&mut self.status.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn view(&self) -> EndpointView {
        EndpointView {
            name: self.name.clone(),
            path: self.path.clone(),
            snapshot: self.latest(),
            status: self.status(),
        }
    }
}

/// What an exposition adapter reads for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointView {
    pub name: String,
    pub path: PathBuf,
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: PollerStatus,
}

impl EndpointView {
    /// At least one sample has been published.
    pub fn ok(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The data shown is not being refreshed right now.
    pub fn is_stale(&self) -> bool {
        self.status.state != PollerState::Sampling
    }
}
