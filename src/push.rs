//! Periodic push of the exporter's metrics to a Prometheus Pushgateway.
//!
//! The push client is blocking, so every push runs on the blocking pool. A
//! failed push is logged and retried at the next tick.

use std::time::{Duration, Instant};

use prometheus::proto::MetricFamily;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Pushes metrics to `url` every `interval` until `shutdown` is cancelled.
pub async fn run_push_loop(
    state: SharedState,
    url: String,
    job: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!(
        "Pushing metrics to {} every {}s (job '{}')",
        url,
        interval.as_secs(),
        job
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let families = state.gather().await;
        let start = Instant::now();
        match push_once(url.clone(), job.clone(), families).await {
            Ok(()) => {
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                state.health_stats.record_push_success(duration_ms);
                debug!("Pushed metrics to {} in {:.1}ms", url, duration_ms);
            }
            Err(e) => {
                state.health_stats.record_push_failure();
                warn!("Failed to push metrics to {}: {}", url, e);
            }
        }
    }

    debug!("Push loop stopped");
}

/// Waits for the push task to finish, at most `deadline`. A push still
/// blocked on the gateway after that is abandoned.
pub async fn stop_push_task(mut task: JoinHandle<()>, deadline: Duration) {
    match tokio::time::timeout(deadline, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Push task failed: {}", e),
        Err(_) => {
            task.abort();
            warn!(
                "Push task did not stop within {}ms, abandoning it",
                deadline.as_millis()
            );
        }
    }
}

async fn push_once(
    url: String,
    job: String,
    families: Vec<MetricFamily>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::task::spawn_blocking(move || {
        let grouping = prometheus::labels! {
            "instance".to_owned() => hostname(),
        };
        prometheus::push_metrics(&job, grouping, &url, families, None)
    })
    .await??;
    Ok(())
}

/// Instance label of pushed metrics.
fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
