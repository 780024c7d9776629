//! Rates command implementation.
//!
//! Runs a single poller against one telemetry socket and prints the per-port
//! packet rates of every completed cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dpdk_telemetry_exporter::telemetry::{
    endpoint_socket_path, EndpointState, Poller, RateRecord,
};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// How often the console loop looks for a new snapshot.
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Formats a rate with K/M/G suffixes (powers of 1000). Negative rates from a
/// counter reset are scaled the same way and keep their sign.
pub fn human_readable(value: f64) -> String {
    const UNITS: [&str; 3] = ["K", "M", "G"];

    let sign = if value < 0.0 { "-" } else { "" };
    let mut value = value.abs();
    let mut unit = "";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }

    if unit.is_empty() {
        format!("{}{:.1}", sign, value)
    } else if value < 100.0 {
        format!("{}{:.1}{}", sign, value, unit)
    } else {
        format!("{}{:.0}{}", sign, value, unit)
    }
}

/// One console line per active port, in port order.
pub fn format_rate_lines(rates: &RateRecord) -> Vec<String> {
    rates
        .iter()
        .map(|(port, r)| {
            let mut line = format!(
                "{}: RX={} pkt/s DROP={} pkt/s TX={} pkt/s",
                port,
                human_readable(r.rx),
                human_readable(r.drop),
                human_readable(r.tx)
            );
            if r.counter_reset {
                line.push_str(" (counter reset)");
            }
            line
        })
        .collect()
}

/// Picks the first application directory under the socket root.
fn default_endpoint(config: &Config) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(config.sock_prefix())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs.first()
        .map(|dir| endpoint_socket_path(dir, config.socket_name()))
        .ok_or_else(|| {
            format!(
                "No DPDK application found under {}",
                config.sock_prefix().display()
            )
            .into()
        })
}

/// Prints packet rates of one endpoint until interrupted or `iterations`
/// rate cycles were shown (0 = unlimited).
pub async fn command_rates(
    endpoint: Option<PathBuf>,
    interval: Option<u64>,
    iterations: u64,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = match endpoint {
        Some(path) => path,
        None => default_endpoint(config)?,
    };

    let mut settings = config.poller_settings();
    settings.capture_port_info = false;
    if let Some(secs) = interval {
        if secs == 0 {
            return Err("--interval must be greater than zero".into());
        }
        settings.interval = Duration::from_secs(secs);
    }

    println!("📈 DPDK port rates for {}", path.display());
    println!(
        "   sampling every {}s, press Ctrl+C to stop",
        settings.interval.as_secs()
    );

    let backoff = settings.backoff;
    let state = Arc::new(EndpointState::new(path.display().to_string(), &path));
    let shutdown = CancellationToken::new();
    let poller = tokio::spawn(Poller::new(state.clone(), settings).run(shutdown.clone()));

    let mut ticker = tokio::time::interval(WATCH_INTERVAL);
    let mut last_seen: Option<DateTime<Utc>> = None;
    let mut last_error: Option<String> = None;
    let mut shown = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let status = state.status();
        if status.last_error != last_error {
            if let Some(e) = &status.last_error {
                println!("error: {}", e);
                println!("Retry socket connection in {}s...", backoff.as_secs());
            }
            last_error = status.last_error.clone();
        }

        let Some(snapshot) = state.latest() else {
            continue;
        };
        if last_seen == Some(snapshot.published_at) {
            continue;
        }
        last_seen = Some(snapshot.published_at);

        // The first sample of a connection has nothing to compare against.
        if snapshot.cycle < 2 {
            continue;
        }

        println!("---");
        for line in format_rate_lines(&snapshot.rates) {
            println!("{}", line);
        }

        shown += 1;
        if iterations > 0 && shown >= iterations {
            break;
        }
    }

    shutdown.cancel();
    poller.await?;
    Ok(())
}
