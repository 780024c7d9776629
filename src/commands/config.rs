//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("dpdk-telemetry-exporter.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && format == ConfigFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# DPDK Telemetry Exporter Configuration
# ======================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                # Bind IP (0.0.0.0 = all interfaces)
# port: 9465                     # HTTP port
#
# Telemetry Endpoints
# -------------------
# sock_prefix: /var/run/dpdk     # One subdirectory per DPDK application
# socket_name: dpdk_telemetry.v2 # Socket file inside each application directory
# interval_seconds: 1            # Sampling interval per endpoint
# backoff_seconds: 1             # Wait before reconnecting after a failure
# command_timeout_ms: 2000       # Per-command socket timeout
# shutdown_timeout_seconds: 5    # Time pollers get to stop on shutdown
# capture_port_info: true        # Query /ethdev/info once per connection
#
# Pushgateway
# -----------
# push_gateway_url: null         # e.g. http://pushgateway:9091 (null = disabled)
# push_interval_seconds: 10      # Push period
# push_job: dpdk-telemetry       # Job label of pushed metrics
#
# Logging
# -------
# log_level: info                # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false              # Enable HTTPS (default: false)
# tls_cert_path: null            # Path to TLS certificate (PEM format)
# tls_key_path: null             # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
