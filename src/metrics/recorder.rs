//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, Encoder, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording session-layer metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a login attempt with its outcome ("success" / "failure").
    fn record_login(&self, result: &str);

    /// Records a completed refresh cycle ("success" / "failure" / "discarded" / "timeout").
    fn record_refresh(&self, result: &str);

    /// Records how the interceptor disposed of a request
    /// ("public", "passed", "recovered", "failed").
    fn record_intercepted(&self, outcome: &str);

    /// Records a request that waited on someone else's refresh.
    fn record_queued(&self);

    /// Records an HTTP round trip; status 0 means no response.
    fn record_request(&self, method: &str, status: u16, duration_secs: f64);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    login_attempts_total: CounterVec,
    refresh_cycles_total: CounterVec,
    intercepted_requests_total: CounterVec,
    queued_requests_total: Counter,
    request_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let login_attempts_total = register_counter_vec_with_registry!(
            Opts::new("session_login_attempts_total", "Total login attempts"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register session_login_attempts_total");

        let refresh_cycles_total = register_counter_vec_with_registry!(
            Opts::new("session_refresh_cycles_total", "Total token refresh cycles"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register session_refresh_cycles_total");

        let intercepted_requests_total = register_counter_vec_with_registry!(
            Opts::new(
                "session_intercepted_requests_total",
                "Requests handled by the interceptor, by outcome"
            ),
            &["outcome"],
            registry.clone()
        )
        .expect("Failed to register session_intercepted_requests_total");

        let queued_requests_total = register_counter_with_registry!(
            Opts::new(
                "session_queued_requests_total",
                "Requests that waited for an in-flight refresh"
            ),
            registry.clone()
        )
        .expect("Failed to register session_queued_requests_total");

        let request_duration_seconds = register_histogram_vec_with_registry!(
            "session_http_request_duration_seconds",
            "Outbound HTTP request duration in seconds",
            &["method", "status"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            registry.clone()
        )
        .expect("Failed to register session_http_request_duration_seconds");

        Metrics {
            registry,
            login_attempts_total,
            refresh_cycles_total,
            intercepted_requests_total,
            queued_requests_total,
            request_duration_seconds,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Current value of a refresh counter, mostly for tests and diagnostics.
    pub fn refresh_count(&self, result: &str) -> u64 {
        self.refresh_cycles_total.with_label_values(&[result]).get() as u64
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_login(&self, result: &str) {
        self.login_attempts_total.with_label_values(&[result]).inc();
    }

    fn record_refresh(&self, result: &str) {
        self.refresh_cycles_total.with_label_values(&[result]).inc();
    }

    fn record_intercepted(&self, outcome: &str) {
        self.intercepted_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    fn record_queued(&self) {
        self.queued_requests_total.inc();
    }

    fn record_request(&self, method: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.request_duration_seconds
            .with_label_values(&[method, status.as_str()])
            .observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = Metrics::new();
        metrics.record_login("success");
        metrics.record_refresh("failure");
        metrics.record_refresh("failure");
        metrics.record_request("GET", 200, 0.02);

        let text = metrics.render();
        assert!(text.contains("session_login_attempts_total{result=\"success\"} 1"));
        assert!(text.contains("session_refresh_cycles_total{result=\"failure\"} 2"));
        assert!(text.contains("session_http_request_duration_seconds_count"));
        assert_eq!(metrics.refresh_count("failure"), 2);
        assert_eq!(metrics.refresh_count("success"), 0);
    }
}
