//! Configuration management for dpdk-telemetry-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use dpdk_telemetry_exporter::telemetry::{PollerSettings, DEFAULT_SOCKET_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9465;
pub const DEFAULT_SOCK_PREFIX: &str = "/var/run/dpdk";
pub const DEFAULT_INTERVAL_SECONDS: u64 = 1;
pub const DEFAULT_BACKOFF_SECONDS: u64 = 1;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_PUSH_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_PUSH_JOB: &str = "dpdk-telemetry";

/// Exporter configuration. Unset fields fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Telemetry endpoints
    #[serde(alias = "sock-prefix")]
    pub sock_prefix: Option<PathBuf>,
    #[serde(alias = "socket-name")]
    pub socket_name: Option<String>,
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    #[serde(alias = "backoff-seconds")]
    pub backoff_seconds: Option<u64>,
    #[serde(alias = "command-timeout-ms")]
    pub command_timeout_ms: Option<u64>,
    #[serde(alias = "shutdown-timeout-seconds")]
    pub shutdown_timeout_seconds: Option<u64>,
    #[serde(alias = "capture-port-info")]
    pub capture_port_info: Option<bool>,

    // Pushgateway
    #[serde(alias = "push-gateway-url")]
    pub push_gateway_url: Option<String>,
    #[serde(alias = "push-interval-seconds")]
    pub push_interval_seconds: Option<u64>,
    #[serde(alias = "push-job")]
    pub push_job: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<LogLevel>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            sock_prefix: Some(PathBuf::from(DEFAULT_SOCK_PREFIX)),
            socket_name: Some(DEFAULT_SOCKET_NAME.to_string()),
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            backoff_seconds: Some(DEFAULT_BACKOFF_SECONDS),
            command_timeout_ms: Some(DEFAULT_COMMAND_TIMEOUT_MS),
            shutdown_timeout_seconds: Some(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS),
            capture_port_info: Some(true),
            push_gateway_url: None,
            push_interval_seconds: Some(DEFAULT_PUSH_INTERVAL_SECONDS),
            push_job: Some(DEFAULT_PUSH_JOB.to_string()),
            log_level: Some(LogLevel::Info),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn sock_prefix(&self) -> &Path {
        self.sock_prefix
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_SOCK_PREFIX))
    }

    pub fn socket_name(&self) -> &str {
        self.socket_name.as_deref().unwrap_or(DEFAULT_SOCKET_NAME)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_timeout_seconds
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS),
        )
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(
            self.push_interval_seconds
                .unwrap_or(DEFAULT_PUSH_INTERVAL_SECONDS),
        )
    }

    pub fn push_job(&self) -> &str {
        self.push_job.as_deref().unwrap_or(DEFAULT_PUSH_JOB)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or(LogLevel::Info)
    }

    /// Poller timing derived from the effective configuration.
    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            interval: self.interval(),
            backoff: Duration::from_secs(self.backoff_seconds.unwrap_or(DEFAULT_BACKOFF_SECONDS)),
            io_timeout: Duration::from_millis(
                self.command_timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS),
            ),
            capture_port_info: self.capture_port_info.unwrap_or(true),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let positive = [
        ("interval_seconds", cfg.interval_seconds),
        ("backoff_seconds", cfg.backoff_seconds),
        ("command_timeout_ms", cfg.command_timeout_ms),
        ("shutdown_timeout_seconds", cfg.shutdown_timeout_seconds),
        ("push_interval_seconds", cfg.push_interval_seconds),
    ];
    for (name, value) in positive {
        if value == Some(0) {
            return Err(format!("{} must be greater than zero", name).into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    if cfg.socket_name().is_empty() || cfg.socket_name().contains('/') {
        return Err(format!("Invalid socket_name '{}'", cfg.socket_name()).into());
    }

    if let Some(url) = cfg.push_gateway_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!(
                "push_gateway_url '{}' must start with http:// or https://",
                url
            )
            .into());
        }
        if cfg.push_job().is_empty() {
            return Err("push_job must not be empty".into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }

    // Telemetry endpoints
    if let Some(prefix) = &args.sock_prefix {
        config.sock_prefix = Some(prefix.clone());
    }
    if let Some(name) = &args.socket_name {
        config.socket_name = Some(name.clone());
    }
    if let Some(interval) = args.interval {
        config.interval_seconds = Some(interval);
    }
    if let Some(backoff) = args.backoff {
        config.backoff_seconds = Some(backoff);
    }
    if let Some(timeout) = args.command_timeout_ms {
        config.command_timeout_ms = Some(timeout);
    }
    if let Some(timeout) = args.shutdown_timeout {
        config.shutdown_timeout_seconds = Some(timeout);
    }
    if args.no_port_info {
        config.capture_port_info = Some(false);
    }

    // Pushgateway
    if let Some(url) = &args.push_gateway_url {
        config.push_gateway_url = Some(url.clone());
    }
    if let Some(interval) = args.push_interval {
        config.push_interval_seconds = Some(interval);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first default location that exists.
/// Without any file the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/dpdk-telemetry-exporter/config.yaml",
                "/etc/dpdk-telemetry-exporter/config.yml",
                "/etc/dpdk-telemetry-exporter/config.json",
                "/etc/dpdk-telemetry-exporter/config.toml",
                "./dpdk-telemetry-exporter.yaml",
                "./dpdk-telemetry-exporter.yml",
                "./dpdk-telemetry-exporter.json",
                "./dpdk-telemetry-exporter.toml",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    parse_config(&path, &content)
}

/// Parses config text, choosing the format from the file extension (YAML by default).
pub fn parse_config(path: &Path, content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
