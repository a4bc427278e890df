//! Prometheus metric definitions.
//!
//! Defines all service metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Database operation latency buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<MemoryMetrics>> = Lazy::new(MemoryMetrics::new);

/// Container for all service metrics.
#[derive(Clone)]
pub struct MemoryMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Database operation counter - labels: operation, entity, status
    pub db_operations_total: CounterVec,

    /// Database operation duration histogram - labels: operation, entity
    pub db_operation_duration_seconds: HistogramVec,

    /// Ingest counter - labels: status (ok/rejected/error)
    pub ingest_total: CounterVec,

    /// Rate-limit rejections - labels: agent
    pub rate_limit_rejections_total: CounterVec,

    /// Redaction failures (fail-open path taken) - labels: reason
    pub redaction_failures_total: CounterVec,

    /// Background loop cycle counter - labels: status
    pub background_loop_cycles_total: CounterVec,

    /// Lessons mined by the background loop (gauge, last cycle)
    pub lessons_mined: Gauge,
}

impl MemoryMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "memory_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "memory_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            db_operations_total: register_counter_vec!(
                "memory_db_operations_total",
                "Total number of database operations",
                &["operation", "entity", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operations_total: {}", e)))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "memory_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation", "entity"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operation_duration_seconds: {}", e)))?,

            ingest_total: register_counter_vec!(
                "memory_ingest_total",
                "Total ingest attempts",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register ingest_total: {}", e)))?,

            rate_limit_rejections_total: register_counter_vec!(
                "memory_rate_limit_rejections_total",
                "Total requests rejected by the per-agent rate limiter",
                &["agent"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register rate_limit_rejections_total: {}", e)))?,

            redaction_failures_total: register_counter_vec!(
                "memory_redaction_failures_total",
                "Total redaction calls that failed open",
                &["reason"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register redaction_failures_total: {}", e)))?,

            background_loop_cycles_total: register_counter_vec!(
                "memory_background_loop_cycles_total",
                "Total background loop cycles",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register background_loop_cycles_total: {}", e)))?,

            lessons_mined: register_gauge!(
                "memory_lessons_mined",
                "Lessons mined during the most recent background cycle"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register lessons_mined: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a database operation.
    pub fn record_db_operation(
        &self,
        operation: &str,
        entity: &str,
        success: bool,
        duration_secs: f64,
    ) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, entity, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation, entity])
            .observe(duration_secs);
    }

    /// Record an ingest attempt.
    pub fn record_ingest(&self, status: &str) {
        self.ingest_total.with_label_values(&[status]).inc();
    }

    /// Record a rate-limit rejection for an agent.
    pub fn record_rate_limit_rejection(&self, agent: &str) {
        self.rate_limit_rejections_total.with_label_values(&[agent]).inc();
    }

    /// Record a redaction call that failed open.
    pub fn record_redaction_failure(&self, reason: &str) {
        self.redaction_failures_total.with_label_values(&[reason]).inc();
    }

    /// Record a background loop cycle outcome.
    pub fn record_background_cycle(&self, status: &str) {
        self.background_loop_cycles_total.with_label_values(&[status]).inc();
    }

    /// Set the number of lessons mined in the most recent cycle.
    pub fn set_lessons_mined(&self, count: i64) {
        self.lessons_mined.set(count as f64);
    }
}

impl Default for MemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(metrics.http_requests_total.desc().len() > 0);
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_http_request("GET", "/search", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_record_db_operation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_db_operation("insert", "memory", true, 0.005);
        metrics.record_db_operation("get", "lesson", false, 0.010);
        Ok(())
    }

    #[test]
    fn test_ingest_metrics() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_ingest("ok");
        metrics.record_ingest("rejected");
        Ok(())
    }

    #[test]
    fn test_rate_limit_and_redaction_metrics() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_rate_limit_rejection("agent-a");
        metrics.record_redaction_failure("upstream_error");
        Ok(())
    }

    #[test]
    fn test_background_cycle_metrics() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_background_cycle("ok");
        metrics.set_lessons_mined(3);
        Ok(())
    }
}
