//! # Prometheus Metrics
//!
//! HTTP metrics (request counts, latency, errors) are recorded by
//! [`metrics_middleware`]. Domain gauges are refreshed on each `/metrics`
//! scrape from the in-memory stores; see the handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, Gauge, GaugeVec, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    gosi_employees_total: GaugeVec,
    rate_progression_events_total: Gauge,
    kpi_modules_total: Gauge,
    kpis_total: Gauge,
    kpi_measurements_total: Gauge,
    audit_trail_entries_total: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("aqlhr_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "aqlhr_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("aqlhr_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let gosi_employees_total = GaugeVec::new(
            Opts::new(
                "aqlhr_gosi_employees_total",
                "Configured GOSI employees by system type and nationality",
            ),
            &["system_type", "nationality"],
        )
        .expect("metric can be created");

        let rate_progression_events_total = Gauge::new(
            "aqlhr_gosi_rate_progression_events_total",
            "Rate progression domain events emitted",
        )
        .expect("metric can be created");

        let kpi_modules_total = Gauge::new("aqlhr_kpi_modules_total", "Registered KPI modules")
            .expect("metric can be created");

        let kpis_total =
            Gauge::new("aqlhr_kpis_total", "Registered KPIs").expect("metric can be created");

        let kpi_measurements_total = Gauge::new(
            "aqlhr_kpi_measurements_total",
            "Recorded KPI measurements",
        )
        .expect("metric can be created");

        let audit_trail_entries_total = Gauge::new(
            "aqlhr_audit_trail_entries_total",
            "Total audit trail entries",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(gosi_employees_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(rate_progression_events_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(kpi_modules_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(kpis_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(kpi_measurements_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(audit_trail_entries_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                gosi_employees_total,
                rate_progression_events_total,
                kpi_modules_total,
                kpis_total,
                kpi_measurements_total,
                audit_trail_entries_total,
            }),
        }
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count across all labels.
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Domain gauges --

    pub fn gosi_employees_total(&self) -> &GaugeVec {
        &self.inner.gosi_employees_total
    }

    pub fn rate_progression_events_total(&self) -> &Gauge {
        &self.inner.rate_progression_events_total
    }

    pub fn kpi_modules_total(&self) -> &Gauge {
        &self.inner.kpi_modules_total
    }

    pub fn kpis_total(&self) -> &Gauge {
        &self.inner.kpis_total
    }

    pub fn kpi_measurements_total(&self) -> &Gauge {
        &self.inner.kpi_measurements_total
    }

    pub fn audit_trail_entries_total(&self) -> &Gauge {
        &self.inner.audit_trail_entries_total
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Label for the request path. Unrouted paths collapse into one label.
fn path_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = path_label(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}
