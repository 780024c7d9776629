//! DPDK Telemetry Exporter Library
//!
//! This library holds the polling core of the exporter: it talks to the
//! telemetry sockets of DPDK applications, samples per-port ethdev counters,
//! derives packet rates and publishes the result to a shared state that HTTP
//! and metrics adapters read without ever touching a socket.
//!
//! # Features
//!
//! - **Reconnecting Pollers**: one task per endpoint, retrying forever with a fixed backoff
//! - **All-or-nothing Sampling**: a failed port command discards the whole pass
//! - **Rate Engine**: RX/DROP/TX packet rates from consecutive samples, idle ports omitted
//! - **Dynamic Registry**: endpoints added and removed as application directories come and go
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dpdk_telemetry_exporter::telemetry::{EndpointRegistry, PollerSettings};
//!
//! # async fn run() {
//! let registry = EndpointRegistry::new(PollerSettings::default(), Duration::from_secs(5));
//! registry
//!     .add_endpoint("rte", "/var/run/dpdk/rte/dpdk_telemetry.v2")
//!     .await;
//!
//! if let Some(view) = registry.get_snapshot("rte") {
//!     if let Some(snapshot) = &view.snapshot {
//!         for (port, rates) in snapshot.rates.iter() {
//!             println!("port {}: rx={} drop={} tx={}", port, rates.rx, rates.drop, rates.tx);
//!         }
//!     }
//! }
//!
//! registry.shutdown().await;
//! # }
//! ```

pub mod error;
pub mod health_stats;
pub mod telemetry;

// Re-export main types for convenience
pub use error::TelemetryError;
pub use health_stats::HealthStats;
pub use telemetry::{
    EndpointRegistry, EndpointView, PollerSettings, PollerState, RateRecord, Sample, Session,
    Snapshot,
};
