//! Request-completed hook and the process-wide counters fed by it.

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;

use crate::state::AppState;

/// Number of most recent request durations kept for the average
pub const DURATION_WINDOW: usize = 1000;

/// What the router reports once a response has been produced
#[derive(Debug)]
pub struct RequestRecord<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// Subscriber to completed requests
pub trait RequestObserver: Send + Sync {
    fn request_completed(&self, record: &RequestRecord<'_>);
}

pub struct Metrics {
    requests: AtomicU64,
    durations_ms: Mutex<VecDeque<f64>>,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            durations_ms: Mutex::new(VecDeque::with_capacity(DURATION_WINDOW)),
            started_at: Instant::now(),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Mean duration over the last [`DURATION_WINDOW`] requests, 0 when none
    pub fn average_duration_ms(&self) -> f64 {
        let durations = self.durations_ms.lock();
        if durations.is_empty() {
            return 0.0;
        }
        durations.iter().sum::<f64>() / durations.len() as f64
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Prometheus text exposition of the counters
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP http_requests_total Total number of HTTP requests");
        let _ = writeln!(out, "# TYPE http_requests_total counter");
        let _ = writeln!(out, "http_requests_total {}", self.request_count());
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "# HELP http_request_duration_ms Average HTTP request duration in milliseconds"
        );
        let _ = writeln!(out, "# TYPE http_request_duration_ms gauge");
        let _ = writeln!(out, "http_request_duration_ms {}", self.average_duration_ms());
        let _ = writeln!(out);
        let _ = writeln!(out, "# HELP app_uptime_seconds Application uptime in seconds");
        let _ = writeln!(out, "# TYPE app_uptime_seconds gauge");
        let _ = writeln!(out, "app_uptime_seconds {}", self.uptime().as_secs());
        let _ = writeln!(out);
        let _ = writeln!(out, "# HELP app_version_info Service version information");
        let _ = writeln!(out, "# TYPE app_version_info gauge");
        let _ = writeln!(
            out,
            "app_version_info{{version=\"{}\"}} 1",
            env!("CARGO_PKG_VERSION")
        );
        out
    }
}

impl RequestObserver for Metrics {
    fn request_completed(&self, record: &RequestRecord<'_>) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let mut durations = self.durations_ms.lock();
        if durations.len() == DURATION_WINDOW {
            durations.pop_front();
        }
        durations.push_back(millis(record.elapsed));
    }
}

/// Observer that writes one log line per completed request
pub struct AccessLog;

impl RequestObserver for AccessLog {
    fn request_completed(&self, record: &RequestRecord<'_>) {
        tracing::info!(
            "{} {} -> {} in {:.3}ms",
            record.method,
            record.path,
            record.status.as_u16(),
            millis(record.elapsed)
        );
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

/// Middleware that times each request and notifies every registered observer
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let record = RequestRecord {
        method: &method,
        path: &path,
        status: response.status(),
        elapsed: start.elapsed(),
    };
    for observer in state.observers.iter() {
        observer.request_completed(&record);
    }
    response
}
