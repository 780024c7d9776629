//! CLI arguments and subcommands for dpdk-telemetry-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "dpdk-telemetry-exporter",
    about = "Prometheus exporter for DPDK ethdev telemetry",
    long_about = "Prometheus exporter for DPDK ethdev telemetry.\n\n\
                  Watches the DPDK runtime directory for applications, polls their telemetry \
                  sockets for per-port counters and exposes raw counters and RX/DROP/TX packet \
                  rates over HTTP JSON, a Prometheus scrape endpoint and an optional Pushgateway.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config file, default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// DPDK runtime directory holding one subdirectory per application
    #[arg(long)]
    pub sock_prefix: Option<PathBuf>,

    /// Telemetry socket file name inside each application directory
    #[arg(long)]
    pub socket_name: Option<String>,

    /// Seconds between two sampling passes
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Seconds to wait before reconnecting to a failed endpoint
    #[arg(long)]
    pub backoff: Option<u64>,

    /// Timeout in milliseconds for the handshake and each telemetry command
    #[arg(long)]
    pub command_timeout_ms: Option<u64>,

    /// Seconds to wait for pollers to stop on shutdown
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Prometheus Pushgateway URL (enables periodic push)
    #[arg(long)]
    pub push_gateway_url: Option<String>,

    /// Seconds between two pushes to the Pushgateway
    #[arg(long)]
    pub push_interval: Option<u64>,

    /// Do not fetch /ethdev/info for each port after connecting
    #[arg(long)]
    pub no_port_info: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe every telemetry endpoint once and report
    Check {
        /// Also fetch stats for every port
        #[arg(long)]
        stats: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Print per-port packet rates of one endpoint to the console
    Rates {
        /// Telemetry socket path (default: first endpoint under sock_prefix)
        #[arg(short = 'e', long)]
        endpoint: Option<PathBuf>,

        /// Seconds between two samples (default: configured interval)
        #[arg(short = 'i', long)]
        interval: Option<u64>,

        /// Number of rate lines to print per port (0 = until interrupted)
        #[arg(short = 'n', long, default_value_t = 0)]
        iterations: u64,
    },
}
