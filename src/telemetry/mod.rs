//! DPDK telemetry polling core.
//!
//! Leaves first:
//! - `session`: one SOCK_SEQPACKET connection to one telemetry socket
//! - `ports`: enumeration of the ethdev ports behind a session
//! - `sampler`: all-or-nothing per-port command passes
//! - `rates`: packet rates derived from two consecutive samples
//! - `state`: the per-endpoint shared state read by exposition adapters
//! - `poller`: the reconnecting loop that owns one endpoint
//! - `registry`: endpoint name to running poller mapping
//! - `watcher`: socket directory scan and live watch feeding the registry

pub mod poller;
pub mod ports;
pub mod rates;
pub mod registry;
pub mod sampler;
pub mod session;
pub mod state;
pub mod watcher;

/// Identifier of one ethdev port behind an endpoint.
pub type PortId = u16;

pub use poller::{Poller, PollerSettings};
pub use ports::{decode_port_list, list_ports, LIST_COMMAND};
pub use rates::{compute_rates, PortRates, RateRecord};
pub use registry::EndpointRegistry;
pub use sampler::{sample_all, Sample, StatSet, INFO_COMMAND, STATS_COMMAND};
pub use session::{
    parse_response, Handshake, Session, DEFAULT_SOCKET_NAME, HANDSHAKE_BUFFER_LEN,
    MAX_OUTPUT_LEN_LIMIT,
};
pub use state::{EndpointState, EndpointView, PollerState, PollerStatus, Snapshot};
pub use watcher::{
    classify_event, endpoint_name, endpoint_socket_path, scan_existing, DirectoryEvent,
    DirectoryWatcher,
};
