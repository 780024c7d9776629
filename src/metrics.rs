//! Prometheus metrics definitions for dpdk-telemetry-exporter.
//!
//! The registry is rebuilt from the pollers' published snapshots on every
//! scrape or push. Vectors are reset first so ports and endpoints that went
//! away do not linger as stale series.

use dpdk_telemetry_exporter::telemetry::EndpointView;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};

/// Collection of the exporter's DPDK metrics.
#[derive(Clone)]
pub struct TelemetryMetrics {
    // ========== Port Metrics ==========
    pub ethdev_stat: GaugeVec,    // labels: app, port, stat
    pub ethdev_rx_pps: GaugeVec,  // labels: app, port
    pub ethdev_drop_pps: GaugeVec, // labels: app, port
    pub ethdev_tx_pps: GaugeVec,  // labels: app, port
    pub ethdev_rx_bps: GaugeVec,  // labels: app, port
    pub ethdev_tx_bps: GaugeVec,  // labels: app, port

    // ========== Endpoint Metrics ==========
    pub endpoint_up: GaugeVec,                     // labels: app
    pub endpoint_ports: GaugeVec,                  // labels: app
    pub endpoint_reconnects_total: CounterVec,     // labels: app
    pub endpoint_poll_failures_total: CounterVec,  // labels: app
    pub endpoint_last_success_timestamp: GaugeVec, // labels: app
}

impl TelemetryMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let port_labels = &["app", "port"];

        let ethdev_stat = GaugeVec::new(
            Opts::new(
                "dpdk_ethdev_stat",
                "Raw ethdev counter as reported by /ethdev/stats",
            ),
            &["app", "port", "stat"],
        )?;
        let ethdev_rx_pps = GaugeVec::new(
            Opts::new("dpdk_ethdev_rx_pps", "Received packets per second"),
            port_labels,
        )?;
        let ethdev_drop_pps = GaugeVec::new(
            Opts::new(
                "dpdk_ethdev_drop_pps",
                "Packets missed on receive (imissed) per second",
            ),
            port_labels,
        )?;
        let ethdev_tx_pps = GaugeVec::new(
            Opts::new("dpdk_ethdev_tx_pps", "Transmitted packets per second"),
            port_labels,
        )?;
        let ethdev_rx_bps = GaugeVec::new(
            Opts::new("dpdk_ethdev_rx_bytes_per_second", "Received bytes per second"),
            port_labels,
        )?;
        let ethdev_tx_bps = GaugeVec::new(
            Opts::new(
                "dpdk_ethdev_tx_bytes_per_second",
                "Transmitted bytes per second",
            ),
            port_labels,
        )?;

        let endpoint_up = GaugeVec::new(
            Opts::new(
                "dpdk_endpoint_up",
                "Whether the endpoint is currently being sampled (1) or not (0)",
            ),
            &["app"],
        )?;
        let endpoint_ports = GaugeVec::new(
            Opts::new(
                "dpdk_endpoint_ports",
                "Number of ethdev ports in the last sample",
            ),
            &["app"],
        )?;
        let endpoint_reconnects_total = CounterVec::new(
            Opts::new(
                "dpdk_endpoint_reconnects_total",
                "Successful connections to the telemetry socket",
            ),
            &["app"],
        )?;
        let endpoint_poll_failures_total = CounterVec::new(
            Opts::new(
                "dpdk_endpoint_poll_failures_total",
                "Connections that ended in a failure",
            ),
            &["app"],
        )?;
        let endpoint_last_success_timestamp = GaugeVec::new(
            Opts::new(
                "dpdk_endpoint_last_success_timestamp_seconds",
                "Unix time of the last published sample",
            ),
            &["app"],
        )?;

        registry.register(Box::new(ethdev_stat.clone()))?;
        registry.register(Box::new(ethdev_rx_pps.clone()))?;
        registry.register(Box::new(ethdev_drop_pps.clone()))?;
        registry.register(Box::new(ethdev_tx_pps.clone()))?;
        registry.register(Box::new(ethdev_rx_bps.clone()))?;
        registry.register(Box::new(ethdev_tx_bps.clone()))?;
        registry.register(Box::new(endpoint_up.clone()))?;
        registry.register(Box::new(endpoint_ports.clone()))?;
        registry.register(Box::new(endpoint_reconnects_total.clone()))?;
        registry.register(Box::new(endpoint_poll_failures_total.clone()))?;
        registry.register(Box::new(endpoint_last_success_timestamp.clone()))?;

        Ok(Self {
            ethdev_stat,
            ethdev_rx_pps,
            ethdev_drop_pps,
            ethdev_tx_pps,
            ethdev_rx_bps,
            ethdev_tx_bps,
            endpoint_up,
            endpoint_ports,
            endpoint_reconnects_total,
            endpoint_poll_failures_total,
            endpoint_last_success_timestamp,
        })
    }

    fn reset(&self) {
        self.ethdev_stat.reset();
        self.ethdev_rx_pps.reset();
        self.ethdev_drop_pps.reset();
        self.ethdev_tx_pps.reset();
        self.ethdev_rx_bps.reset();
        self.ethdev_tx_bps.reset();
        self.endpoint_up.reset();
        self.endpoint_ports.reset();
        self.endpoint_reconnects_total.reset();
        self.endpoint_poll_failures_total.reset();
        self.endpoint_last_success_timestamp.reset();
    }

    /// Repopulates every metric from `views`. Callers serialize refreshes.
    pub fn refresh(&self, views: &[EndpointView]) {
        self.reset();

        for view in views {
            let app = view.name.as_str();
            let status = &view.status;

            self.endpoint_up
                .with_label_values(&[app])
                .set(if view.is_stale() { 0.0 } else { 1.0 });

            // Counters carry absolute values, so use the reset + inc_by pattern.
            self.endpoint_reconnects_total
                .with_label_values(&[app])
                .inc_by(status.connects as f64);
            self.endpoint_poll_failures_total
                .with_label_values(&[app])
                .inc_by(status.failures as f64);

            if let Some(ts) = status.last_success {
                self.endpoint_last_success_timestamp
                    .with_label_values(&[app])
                    .set(ts.timestamp_millis() as f64 / 1000.0);
            }

            let Some(snapshot) = &view.snapshot else {
                continue;
            };
            self.endpoint_ports
                .with_label_values(&[app])
                .set(snapshot.sample.len() as f64);

            for (port, stats) in snapshot.sample.iter() {
                let port = port.to_string();
                for (stat, value) in stats.numbers() {
                    self.ethdev_stat
                        .with_label_values(&[app, port.as_str(), stat])
                        .set(value);
                }
            }

            for (port, rates) in snapshot.rates.iter() {
                let port = port.to_string();
                let labels = [app, port.as_str()];
                self.ethdev_rx_pps.with_label_values(&labels).set(rates.rx);
                self.ethdev_drop_pps.with_label_values(&labels).set(rates.drop);
                self.ethdev_tx_pps.with_label_values(&labels).set(rates.tx);
                if let Some(bps) = rates.rx_bytes {
                    self.ethdev_rx_bps.with_label_values(&labels).set(bps);
                }
                if let Some(bps) = rates.tx_bytes {
                    self.ethdev_tx_bps.with_label_values(&labels).set(bps);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dpdk_telemetry_exporter::telemetry::{
        compute_rates, EndpointState, PollerState, Sample, Snapshot, StatSet, STATS_COMMAND,
    };
    use prometheus::{Encoder, TextEncoder};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn stats(ipackets: u64, opackets: u64) -> StatSet {
        [("ipackets", ipackets), ("imissed", 0), ("opackets", opackets)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_refresh_exports_counters_and_rates() {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry).unwrap();

        let t0 = Instant::now();
        let prev = Sample::new(STATS_COMMAND, vec![(0, stats(100, 10))]).with_captured(t0);
        let cur = Sample::new(STATS_COMMAND, vec![(0, stats(300, 50))])
            .with_captured(t0 + Duration::from_secs(2));
        let rates = compute_rates(&prev, &cur, 2.0);

        let state = EndpointState::new("rte", "/var/run/dpdk/rte/dpdk_telemetry.v2");
        state.publish(Snapshot {
            sample: cur,
            rates,
            port_info: None,
            cycle: 2,
            published_at: Utc::now(),
        });
        state.update_status(|s| {
            s.state = PollerState::Sampling;
            s.connects = 3;
        });

        metrics.refresh(&[state.view()]);
        let text = render(&registry);

        assert!(text.contains(r#"dpdk_ethdev_stat{app="rte",port="0",stat="ipackets"} 300"#));
        assert!(text.contains(r#"dpdk_ethdev_rx_pps{app="rte",port="0"} 100"#));
        assert!(text.contains(r#"dpdk_ethdev_tx_pps{app="rte",port="0"} 20"#));
        assert!(text.contains(r#"dpdk_endpoint_up{app="rte"} 1"#));
        assert!(text.contains(r#"dpdk_endpoint_reconnects_total{app="rte"} 3"#));
        assert!(text.contains(r#"dpdk_endpoint_ports{app="rte"} 1"#));
    }

    #[test]
    fn test_removed_endpoint_series_disappear() {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry).unwrap();
        let state = Arc::new(EndpointState::new("gone", "/tmp/gone"));

        metrics.refresh(&[state.view()]);
        assert!(render(&registry).contains(r#"dpdk_endpoint_up{app="gone"} 0"#));

        metrics.refresh(&[]);
        assert!(!render(&registry).contains(r#"app="gone""#));
    }
}
