//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays a landing page
//! with the registered telemetry endpoints and all available routes.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Minimal HTML escaping for endpoint names and paths.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let views = state.endpoints.views();
    let mut rows = String::new();
    for view in &views {
        let name = escape(&view.name);
        let ports = view
            .snapshot
            .as_ref()
            .map(|s| s.sample.len().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            rows,
            r#"        <tr><td><a href="/endpoints/{name}/rates">{name}</a></td><td>{state}</td><td>{ports}</td><td><code>{path}</code></td></tr>"#,
            state = view.status.state,
            path = escape(&view.path.display().to_string()),
        )
        .ok();
    }
    if views.is_empty() {
        rows.push_str("        <tr><td colspan=\"4\">No endpoints registered</td></tr>\n");
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>DPDK Telemetry Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; line-height: 1.6; }}
        .container {{ max-width: 900px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }}
        h2 {{ color: #555; margin-top: 35px; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ text-align: left; padding: 6px 10px; border-bottom: 1px solid #ddd; }}
        .endpoint-list li {{ margin: 10px 0; }}
        .endpoint-list a {{ color: #007bff; text-decoration: none; font-weight: 600; }}
        .footer {{ margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; color: #666; font-size: 0.9em; text-align: center; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; font-family: 'Courier New', monospace; }}
    </style>
</head>
<body>
<div class="container">
    <h1>DPDK Telemetry Exporter</h1>
    <p>Version {version} | Uptime {uptime} | Sampling every {interval}s</p>

    <h2>Telemetry Endpoints</h2>
    <table>
        <tr><th>Name</th><th>State</th><th>Ports</th><th>Socket</th></tr>
{rows}    </table>

    <h2>Available Routes</h2>
    <ul class="endpoint-list">
        <li><a href="/metrics">/metrics</a> Prometheus metrics</li>
        <li><a href="/endpoints">/endpoints</a> endpoint list with poller status (JSON)</li>
        <li><code>/endpoints/&lt;name&gt;/stats</code>, <code>/rates</code>, <code>/info</code> per-endpoint data (JSON)</li>
        <li><a href="/ethdev/stats">/ethdev/stats</a> raw port counters of all endpoints (JSON)</li>
        <li><a href="/ethdev/stats/rate">/ethdev/stats/rate</a> port packet rates of all endpoints (JSON)</li>
        <li><a href="/health">/health</a> exporter health statistics (text)</li>
        <li><a href="/config">/config</a> active configuration (text)</li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        interval = state.config.interval().as_secs(),
        rows = rows,
        footer = FOOTER_TEXT
    );

    Html(html)
}
