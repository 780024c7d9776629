//! Reconnecting poller.
//!
//! One poller owns one endpoint for its whole lifetime:
//!
//! ```text
//! DISCONNECTED -> CONNECTING -> ENUMERATING -> SAMPLING (steady loop)
//!      ^                                            |
//!      +------------- any failure, backoff ---------+
//! ```
//!
//! Ports and sample history are rebuilt on every connect; rates only resume
//! after two consecutive samples on the same connection.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::list_ports;
use super::rates::{compute_rates, RateRecord};
use super::sampler::{sample_all, Sample, INFO_COMMAND, STATS_COMMAND};
use super::session::Session;
use super::state::{EndpointState, PollerState, Snapshot};
use crate::error::{Result, TelemetryError};

/// Timing knobs of a poller.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Sleep between two sampling passes.
    pub interval: Duration,
    /// Fixed delay before reconnecting after a failure.
    pub backoff: Duration,
    /// Upper bound for the handshake and for each command.
    pub io_timeout: Duration,
    /// Fetch `/ethdev/info` for every port after each connect.
    pub capture_port_info: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            backoff: Duration::from_secs(1),
            io_timeout: Duration::from_millis(2000),
            capture_port_info: true,
        }
    }
}

pub struct Poller {
    state: Arc<EndpointState>,
    settings: PollerSettings,
}

/// Marks the endpoint stopped however the poller future ends, including abort.
struct StopOnExit<'a>(&'a EndpointState);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.update_status(|s| s.state = PollerState::Stopped);
    }
}

impl Poller {
    pub fn new(state: Arc<EndpointState>, settings: PollerSettings) -> Self {
        Self { state, settings }
    }

    pub fn state(&self) -> &Arc<EndpointState> {
        &self.state
    }

    /// Polls until `shutdown` is cancelled. Never returns early on endpoint
    /// failures: an unreachable endpoint is retried forever.
    pub async fn run(self, shutdown: CancellationToken) {
        let _stopped = StopOnExit(&self.state);
        // Declared after the guard so the socket is released first.
        let mut session = Session::new(self.state.path(), self.settings.io_timeout);

        info!(
            endpoint = %self.state.name(),
            path = %self.state.path().display(),
            "Poller started"
        );

        loop {
            let failure = tokio::select! {
                biased;
                _ = shutdown.cancelled() => TelemetryError::Cancelled,
                outcome = self.connected_pass(&mut session) => match outcome {
                    Ok(never) => match never {},
                    Err(e) => e,
                },
            };
            session.close();

            if failure.is_cancelled() {
                debug!(endpoint = %self.state.name(), "Poller cancelled");
                break;
            }
            self.record_failure(&failure);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(endpoint = %self.state.name(), "Poller cancelled during backoff");
                    break;
                }
                _ = tokio::time::sleep(self.settings.backoff) => {}
            }
        }

        info!(endpoint = %self.state.name(), "Poller stopped");
    }

    /// One connection from connect to failure. Only returns with an error.
    async fn connected_pass(&self, session: &mut Session) -> Result<Infallible> {
        self.set_state(PollerState::Connecting);
        let handshake = session.connect().await?.clone();
        self.state.update_status(|s| {
            s.connects += 1;
            s.handshake = Some(handshake);
        });

        self.set_state(PollerState::Enumerating);
        let ports = list_ports(session).await?;
        let port_info = if self.settings.capture_port_info {
            Some(Arc::new(sample_all(session, INFO_COMMAND, &ports).await?))
        } else {
            None
        };
        info!(
            endpoint = %self.state.name(),
            ports = ports.len(),
            "Connected to telemetry endpoint"
        );

        self.set_state(PollerState::Sampling);
        self.state.clear_rates();

        let mut previous = sample_all(session, STATS_COMMAND, &ports).await?;
        let mut cycle = 1;
        self.publish(&previous, RateRecord::default(), &port_info, cycle);

        loop {
            tokio::time::sleep(self.settings.interval).await;

            let current = sample_all(session, STATS_COMMAND, &ports).await?;
            let rates = compute_rates(&previous, &current, current.seconds_since(&previous));
            cycle += 1;
            self.publish(&current, rates, &port_info, cycle);
            previous = current;
        }
    }

    fn publish(&self, sample: &Sample, rates: RateRecord, port_info: &Option<Arc<Sample>>, cycle: u64) {
        let published_at = Utc::now();
        self.state.publish(Snapshot {
            sample: sample.clone(),
            rates,
            port_info: port_info.clone(),
            cycle,
            published_at,
        });
        self.state.update_status(|s| {
            s.samples += 1;
            s.consecutive_failures = 0;
            s.last_success = Some(published_at);
        });
    }

    fn set_state(&self, state: PollerState) {
        self.state.update_status(|s| s.state = state);
    }

    fn record_failure(&self, error: &TelemetryError) {
        let mut consecutive = 0;
        self.state.update_status(|s| {
            s.state = PollerState::Disconnected;
            s.handshake = None;
            s.failures += 1;
            s.consecutive_failures += 1;
            s.last_error = Some(error.to_string());
            s.last_error_kind = Some(error.kind());
            consecutive = s.consecutive_failures;
        });

        // An endpoint that stays down is retried forever; only the first
        // failure of a streak is worth a warning.
        if consecutive == 1 {
            warn!(
                endpoint = %self.state.name(),
                kind = error.kind(),
                backoff_ms = self.settings.backoff.as_millis() as u64,
                "Telemetry endpoint failed: {}",
                error
            );
        } else {
            debug!(
                endpoint = %self.state.name(),
                kind = error.kind(),
                consecutive = consecutive,
                "Telemetry endpoint still failing: {}",
                error
            );
        }
    }
}
