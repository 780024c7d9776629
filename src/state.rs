//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background push task.

use dpdk_telemetry_exporter::telemetry::EndpointRegistry;
use dpdk_telemetry_exporter::HealthStats;
use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::metrics::TelemetryMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    /// Endpoint name to running poller.
    pub endpoints: Arc<EndpointRegistry>,
    pub registry: Registry,
    pub metrics: TelemetryMetrics,
    pub scrape_duration: Gauge,
    pub endpoints_total: Gauge,
    /// Serializes metric refreshes between scrapes and pushes.
    pub refresh_lock: Mutex<()>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the state and registers the exporter's metrics.
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        config: Config,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry)?;

        let scrape_duration = Gauge::new(
            "dpdk_exporter_scrape_duration_seconds",
            "Time spent refreshing and encoding metrics",
        )?;
        let endpoints_total = Gauge::new(
            "dpdk_exporter_endpoints_total",
            "Number of telemetry endpoints currently registered",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(endpoints_total.clone()))?;

        Ok(Self {
            endpoints,
            registry,
            metrics,
            scrape_duration,
            endpoints_total,
            refresh_lock: Mutex::new(()),
            config: Arc::new(config),
            health_stats: Arc::new(HealthStats::new()),
            start_time: Instant::now(),
        })
    }

    /// Refreshes every metric from the current endpoint views and returns the
    /// gathered families. Holds the refresh lock for the whole operation.
    pub async fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        let _guard = self.refresh_lock.lock().await;
        let start = Instant::now();

        let views = self.endpoints.views();
        self.endpoints_total.set(views.len() as f64);
        self.metrics.refresh(&views);
        self.scrape_duration.set(start.elapsed().as_secs_f64());

        self.registry.gather()
    }
}
