//! Check command implementation.
//!
//! Probes every telemetry endpoint under the socket root once and validates
//! the configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dpdk_telemetry_exporter::telemetry::{
    endpoint_name, endpoint_socket_path, list_ports, sample_all, Session, STATS_COMMAND,
};

use crate::config::{validate_effective_config, Config};

/// Outcome of probing one endpoint.
#[derive(Debug)]
pub struct ProbeReport {
    pub ports: Vec<u16>,
    pub counters: usize,
}

/// Connects to one endpoint, lists its ports and optionally samples them.
pub async fn probe_endpoint(
    path: &Path,
    config: &Config,
    stats: bool,
) -> anyhow::Result<ProbeReport> {
    let mut session = Session::new(path, config.poller_settings().io_timeout);
    let handshake = session
        .connect()
        .await
        .with_context(|| format!("connecting to {}", path.display()))?
        .clone();
    println!(
        "   ✅ Connected: version={} pid={} max_output_len={}",
        handshake.version.as_deref().unwrap_or("unknown"),
        handshake
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        handshake.max_output_len
    );

    let ports = list_ports(&mut session)
        .await
        .context("listing ports")?;
    println!("   ✅ {} port(s): {:?}", ports.len(), ports);

    let mut counters = 0;
    if stats && !ports.is_empty() {
        let sample = sample_all(&mut session, STATS_COMMAND, &ports)
            .await
            .context("sampling port stats")?;
        for (port, set) in sample.iter() {
            println!("   ✅ port {}: {} counters", port, set.len());
            counters += set.len();
        }
    }

    session.close();
    Ok(ProbeReport { ports, counters })
}

/// Validates configuration and reachability of all telemetry endpoints.
pub async fn command_check(stats: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 DPDK Telemetry Exporter - System Check");
    println!("=========================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check socket root
    let root = config.sock_prefix();
    println!("\n📁 Checking socket root {}...", root.display());
    let mut dirs: Vec<PathBuf> = match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            println!("   ❌ Cannot read {}: {}", root.display(), e);
            all_ok = false;
            Vec::new()
        }
    };
    dirs.sort();

    if all_ok && dirs.is_empty() {
        println!("   ⚠️  No DPDK application directories found");
    }

    // Probe endpoints
    for dir in &dirs {
        let name = endpoint_name(dir).unwrap_or_else(|| dir.display().to_string());
        let socket = endpoint_socket_path(dir, config.socket_name());
        println!("\n🔌 Endpoint '{}' ({})", name, socket.display());

        if !socket.exists() {
            println!("   ⚠️  Socket not present, application may still be starting");
            continue;
        }

        if let Err(e) = probe_endpoint(&socket, config, stats).await {
            println!("   ❌ Probe failed: {:#}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
