//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current exporter configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Renders the effective configuration as aligned plain text.
pub fn render_config_text(cfg: &Config) -> String {
    let settings = cfg.poller_settings();
    let mut out = String::new();

    writeln!(out, "DPDK TELEMETRY EXPORTER - CONFIGURATION").ok();
    writeln!(out, "=======================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(out, "log_level:                  {:?}", cfg.log_level()).ok();
    writeln!(out).ok();

    writeln!(out, "TELEMETRY ENDPOINTS").ok();
    writeln!(out, "-------------------").ok();
    writeln!(
        out,
        "sock_prefix:                {}",
        cfg.sock_prefix().display()
    )
    .ok();
    writeln!(out, "socket_name:                {}", cfg.socket_name()).ok();
    writeln!(
        out,
        "interval:                   {} seconds",
        settings.interval.as_secs()
    )
    .ok();
    writeln!(
        out,
        "backoff:                    {} seconds",
        settings.backoff.as_secs()
    )
    .ok();
    writeln!(
        out,
        "command_timeout:            {} ms",
        settings.io_timeout.as_millis()
    )
    .ok();
    writeln!(
        out,
        "shutdown_timeout:           {} seconds",
        cfg.drain_timeout().as_secs()
    )
    .ok();
    writeln!(
        out,
        "capture_port_info:          {}",
        settings.capture_port_info
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "PUSHGATEWAY").ok();
    writeln!(out, "-----------").ok();
    writeln!(
        out,
        "push_gateway_url:           {}",
        cfg.push_gateway_url.as_deref().unwrap_or("disabled")
    )
    .ok();
    writeln!(
        out,
        "push_interval:              {} seconds",
        cfg.push_interval().as_secs()
    )
    .ok();
    writeln!(out, "push_job:                   {}", cfg.push_job()).ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:              {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:               {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();

    out
}

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.health_stats.record_http_request();

    let body = render_config_text(&state.config);
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{body}\n{FOOTER_TEXT}\n"),
    )
}
