//! Health statistics and monitoring for the exporter.
//!
//! This module tracks the exporter's own behavior: HTTP traffic, scrape and
//! push performance, and a per-endpoint view of the pollers. It is rendered as
//! a plain-text table by the `/health` endpoint.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::telemetry::EndpointView;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns (last, avg, max, min, count).
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe circular buffer for tracking HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    const RETENTION: Duration = Duration::from_secs(600);

    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            while guard
                .front()
                .is_some_and(|&t| now.duration_since(t) > Self::RETENTION)
            {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            guard
                .iter()
                .filter(|&&t| now.duration_since(t) <= Duration::from_secs(60))
                .count() as u64
        } else {
            0
        }
    }
}

/// Exporter self-health statistics.
pub struct HealthStats {
    // HTTP server
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,
    pub json_endpoint_calls: AtomicU64,
    pub metrics_endpoint_calls: AtomicU64,

    // Prometheus scrape
    pub scrape_duration_ms: Stat,
    pub exported_series: Stat,
    pub metrics_response_size_kb: Stat,

    // Pushgateway
    pub push_success_count: AtomicU64,
    pub push_failure_count: AtomicU64,
    pub push_duration_ms: Stat,
    pub last_push_time: StdRwLock<Option<DateTime<Utc>>>,

    pub start_time: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            json_endpoint_calls: AtomicU64::new(0),
            metrics_endpoint_calls: AtomicU64::new(0),
            scrape_duration_ms: Stat::default(),
            exported_series: Stat::default(),
            metrics_response_size_kb: Stat::default(),
            push_success_count: AtomicU64::new(0),
            push_failure_count: AtomicU64::new(0),
            push_duration_ms: Stat::default(),
            last_push_time: StdRwLock::new(None),
            start_time: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn record_json_endpoint_call(&self) {
        self.json_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scrape(&self, duration_ms: f64, series: u64, response_size_kb: f64) {
        self.scrape_duration_ms.add_sample(duration_ms);
        self.exported_series.add_sample(series as f64);
        self.metrics_response_size_kb.add_sample(response_size_kb);
    }

    pub fn record_push_success(&self, duration_ms: f64) {
        self.push_success_count.fetch_add(1, Ordering::Relaxed);
        self.push_duration_ms.add_sample(duration_ms);
        if let Ok(mut guard) = self.last_push_time.write() {
            *guard = Some(Utc::now());
        }
    }

    pub fn record_push_failure(&self) {
        self.push_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_push_success_rate(&self) -> f64 {
        let success = self.push_success_count.load(Ordering::Relaxed);
        let failure = self.push_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_hours(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 3600.0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_push_time_str(&self) -> String {
        match self.last_push_time.read() {
            Ok(guard) => guard
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            Err(_) => "N/A".to_string(),
        }
    }

    /// Renders the health table. `endpoints` adds one row per poller.
    pub fn render_table(&self, endpoints: &[EndpointView]) -> String {
        let left_col = 26usize;
        let col_w = 12usize;
        let mut out = String::new();

        let stat_row = |out: &mut String, label: &str, stat: &Stat, precision: usize| {
            let (cur, avg, max, min, _) = stat.snapshot();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.p$}", cur, p = precision),
                format!("{:.p$}", avg, p = precision.max(1)),
                format!("{:.p$}", max, p = precision),
                format!("{:.p$}", min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        };
        let counter_row = |out: &mut String, label: &str, value: String| {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                value,
                "N/A",
                "N/A",
                "N/A",
                left = left_col,
                col = col_w
            )
            .ok();
        };

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        // HTTP SERVER section
        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        counter_row(
            &mut out,
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute().to_string(),
        );
        stat_row(&mut out, "avg_request_duration (ms)", &self.request_duration_ms, 1);
        counter_row(
            &mut out,
            "json_endpoint_calls",
            self.json_endpoint_calls.load(Ordering::Relaxed).to_string(),
        );
        counter_row(
            &mut out,
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls.load(Ordering::Relaxed).to_string(),
        );

        // SCRAPE section
        writeln!(out).ok();
        writeln!(out, "PROMETHEUS SCRAPE").ok();
        writeln!(out, "-----------------").ok();
        stat_row(&mut out, "scrape_duration (ms)", &self.scrape_duration_ms, 2);
        stat_row(&mut out, "exported_series", &self.exported_series, 0);
        stat_row(&mut out, "metrics_response_size (KB)", &self.metrics_response_size_kb, 1);

        // PUSH section
        writeln!(out).ok();
        writeln!(out, "PUSHGATEWAY").ok();
        writeln!(out, "-----------").ok();
        counter_row(
            &mut out,
            "push_success_total",
            self.push_success_count.load(Ordering::Relaxed).to_string(),
        );
        counter_row(
            &mut out,
            "push_failure_total",
            self.push_failure_count.load(Ordering::Relaxed).to_string(),
        );
        counter_row(
            &mut out,
            "push_success_rate (%)",
            format!("{:.1}", self.get_push_success_rate()),
        );
        stat_row(&mut out, "push_duration (ms)", &self.push_duration_ms, 1);

        // ENDPOINTS section
        writeln!(out).ok();
        writeln!(out, "TELEMETRY ENDPOINTS").ok();
        writeln!(out, "-------------------").ok();
        if endpoints.is_empty() {
            writeln!(out, "(no endpoints registered)").ok();
        } else {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                "endpoint",
                "state",
                "samples",
                "failures",
                "connects",
                left = left_col,
                col = col_w
            )
            .ok();
            for view in endpoints {
                writeln!(
                    out,
                    "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                    view.name,
                    view.status.state.to_string(),
                    view.status.samples,
                    view.status.failures,
                    view.status.connects,
                    left = left_col,
                    col = col_w
                )
                .ok();
            }
        }

        let up = endpoints.iter().filter(|v| !v.is_stale()).count();

        // Summary line
        writeln!(out).ok();
        writeln!(
            out,
            "endpoints: {} ({} sampling) | last push: {} | uptime: {:.1}h",
            endpoints.len(),
            up,
            self.get_last_push_time_str(),
            self.get_uptime_hours()
        )
        .ok();

        out
    }
}
