//! JSON endpoint handlers.
//!
//! - `/endpoints`: every registered endpoint with its poller status
//! - `/endpoints/{name}/stats|rates|info`: data of one endpoint
//! - `/ethdev/stats`, `/ethdev/stats/rate`: all endpoints, keyed by name
//!
//! Handlers only read the last published snapshots. An endpoint that never
//! completed a sample answers 503 with its status, so callers can tell
//! "unknown" (404) from "not available yet" (503).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dpdk_telemetry_exporter::telemetry::{EndpointView, Snapshot};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::state::SharedState;

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown endpoint '{}'", name) })),
    )
        .into_response()
}

fn unavailable(view: &EndpointView) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "name": view.name,
            "ok": false,
            "status": view.status,
        })),
    )
        .into_response()
}

/// Resolves `name` to a view with data, or the error response to send.
fn lookup(state: &SharedState, name: &str) -> Result<(EndpointView, Arc<Snapshot>), Response> {
    state.health_stats.record_http_request();
    state.health_stats.record_json_endpoint_call();

    let view = state
        .endpoints
        .get_snapshot(name)
        .ok_or_else(|| not_found(name))?;
    match view.snapshot.clone() {
        Some(snapshot) => Ok((view, snapshot)),
        None => Err(unavailable(&view)),
    }
}

/// Summary of one endpoint for listings.
pub fn endpoint_summary(view: &EndpointView) -> Value {
    json!({
        "name": view.name,
        "path": view.path.display().to_string(),
        "ok": view.ok(),
        "stale": view.is_stale(),
        "ports": view.snapshot.as_ref().map(|s| s.sample.ports().collect::<Vec<_>>()),
        "cycle": view.snapshot.as_ref().map(|s| s.cycle),
        "published_at": view.snapshot.as_ref().map(|s| s.published_at),
        "status": view.status,
    })
}

/// Handler for `/endpoints`.
#[instrument(skip(state))]
pub async fn endpoints_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /endpoints request");
    state.health_stats.record_http_request();
    state.health_stats.record_json_endpoint_call();

    let list: Vec<Value> = state
        .endpoints
        .views()
        .iter()
        .map(endpoint_summary)
        .collect();
    Json(Value::Array(list))
}

/// Handler for `/endpoints/{name}/stats`.
#[instrument(skip(state))]
pub async fn endpoint_stats_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Response {
    let (view, snapshot) = match lookup(&state, &name) {
        Ok(found) => found,
        Err(response) => return response,
    };
    Json(json!({
        "name": view.name,
        "stale": view.is_stale(),
        "cycle": snapshot.cycle,
        "taken_at": snapshot.sample.taken_at,
        "ports": snapshot.sample,
    }))
    .into_response()
}

/// Handler for `/endpoints/{name}/rates`.
#[instrument(skip(state))]
pub async fn endpoint_rates_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Response {
    let (view, snapshot) = match lookup(&state, &name) {
        Ok(found) => found,
        Err(response) => return response,
    };
    Json(json!({
        "name": view.name,
        "stale": view.is_stale(),
        "cycle": snapshot.cycle,
        "published_at": snapshot.published_at,
        "rates": snapshot.rates,
    }))
    .into_response()
}

/// Handler for `/endpoints/{name}/info`.
#[instrument(skip(state))]
pub async fn endpoint_info_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Response {
    let (view, snapshot) = match lookup(&state, &name) {
        Ok(found) => found,
        Err(response) => return response,
    };
    match &snapshot.port_info {
        Some(info) => Json(json!({
            "name": view.name,
            "taken_at": info.taken_at,
            "ports": info.as_ref(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "port info capture is disabled" })),
        )
            .into_response(),
    }
}

/// Collects one JSON value per endpoint that has data.
fn aggregate(state: &SharedState, pick: impl Fn(&Snapshot) -> Value) -> Json<Value> {
    state.health_stats.record_http_request();
    state.health_stats.record_json_endpoint_call();

    let mut out = Map::new();
    for view in state.endpoints.views() {
        if let Some(snapshot) = &view.snapshot {
            out.insert(view.name.clone(), pick(snapshot));
        }
    }
    Json(Value::Object(out))
}

/// Handler for `/ethdev/stats`: raw counters of all endpoints.
#[instrument(skip(state))]
pub async fn ethdev_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /ethdev/stats request");
    aggregate(&state, |s| json!(s.sample))
}

/// Handler for `/ethdev/stats/rate`: packet rates of all endpoints.
#[instrument(skip(state))]
pub async fn ethdev_rates_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /ethdev/stats/rate request");
    aggregate(&state, |s| json!(s.rates))
}
