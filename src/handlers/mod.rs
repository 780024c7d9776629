//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page with registered endpoints
//! - `/metrics`: Prometheus metrics endpoint
//! - `/endpoints/*`, `/ethdev/*`: JSON views of the published telemetry
//! - `/health`: Health check endpoint
//! - `/config`: Configuration display endpoint

pub mod config;
pub mod endpoints;
pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use config::config_handler;
pub use endpoints::{
    endpoint_info_handler, endpoint_rates_handler, endpoint_stats_handler, endpoints_handler,
    ethdev_rates_handler, ethdev_stats_handler,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
