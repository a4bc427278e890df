//! Axum middleware for HTTP request tracing and metrics.
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - Distributed tracing spans
//! - Prometheus metrics collection
//! - Trace context propagation (traceparent header)

use axum::http::HeaderMap;
use axum::{body::Body, middleware::Next, response::Response};
use opentelemetry::{
    global,
    propagation::Extractor,
    trace::{Status, TraceContextExt},
    Context, KeyValue,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info_span, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::metrics::METRICS;

/// Extract trace context from incoming request headers.
///
/// Looks for W3C traceparent header for distributed tracing.
fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a HeaderMap);

impl<'a> Extractor for HeaderMapExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

/// Replace UUIDs in a path with a placeholder so memory/lesson/agent ids
/// don't blow up label cardinality in spans or Prometheus.
fn normalize_path(path: &str) -> String {
    static UUID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();

    let uuid_regex = UUID_REGEX.get_or_init(|| {
        regex::Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
    });

    match uuid_regex {
        Ok(regex) => regex.replace_all(path, "{id}").to_string(),
        Err(err) => {
            tracing::error!(error = %err, "failed to compile id regex");
            path.to_string()
        }
    }
}

/// Buckets a normalized path into one of the service's route families, for
/// a low-cardinality dimension that's more useful than the raw path when
/// slicing dashboards (ingest vs. retrieval vs. lesson admin vs. agent
/// admin traffic).
fn classify_resource(normalized_path: &str) -> &'static str {
    let mut segments = normalized_path.trim_start_matches('/').split('/');
    match segments.next().unwrap_or("") {
        "interactions" => "interactions",
        "search" => "search",
        "timeline" => "timeline",
        "lessons" => "lessons",
        "daily" | "memories" => "admin_review",
        "agents" => "agents",
        "config" => "config",
        "init" => "init",
        "health" => "health",
        "metrics" => "metrics",
        _ => "other",
    }
}

/// Observability middleware for Axum.
///
/// This middleware wraps every request with:
/// 1. OpenTelemetry span (with trace context propagation)
/// 2. Prometheus metrics recording
/// 3. Request/response logging
pub async fn observability_middleware(request: axum::http::Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();
    let normalized_path = normalize_path(&path);
    let resource = classify_resource(&normalized_path);

    let parent_context = extract_trace_context(request.headers());

    let tracing_span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
        memory.resource = resource,
        otel.kind = "server",
    );
    tracing_span.set_parent(parent_context);

    let span = tracing_span.clone();
    let response = next.run(request).instrument(tracing_span).await;

    let duration = start.elapsed();
    let status = response.status();
    let duration_secs = duration.as_secs_f64();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &normalized_path, status.as_u16(), duration_secs);
    } else {
        tracing::error!("metrics registry unavailable, skipping HTTP request metrics");
    }

    let cx = span.context();
    cx.span().set_attribute(KeyValue::new("http.method", method.to_string()));
    cx.span().set_attribute(KeyValue::new("http.target", path.clone()));
    cx.span().set_attribute(KeyValue::new("http.route", normalized_path.clone()));
    cx.span().set_attribute(KeyValue::new("http.status_code", status.as_u16() as i64));
    cx.span().set_attribute(KeyValue::new("memory.resource", resource));

    if status.is_server_error() {
        cx.span().set_status(Status::error("server error"));
    } else if status.is_client_error() {
        cx.span().set_status(Status::error("client error"));
    } else {
        cx.span().set_status(Status::Ok);
    }

    cx.span().end();

    tracing::info!(
        method = %method,
        path = %path,
        resource,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_replaces_interaction_id() {
        let path = "/interactions/550e8400-e29b-41d4-a716-446655440000/search";
        assert_eq!(normalize_path(path), "/interactions/{id}/search");
    }

    #[test]
    fn normalize_path_leaves_static_routes_alone() {
        assert_eq!(normalize_path("/interactions"), "/interactions");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }

    #[test]
    fn classify_resource_buckets_known_route_families() {
        assert_eq!(classify_resource("/interactions/{id}"), "interactions");
        assert_eq!(classify_resource("/search"), "search");
        assert_eq!(classify_resource("/lessons/{id}"), "lessons");
        assert_eq!(classify_resource("/memories/{id}"), "admin_review");
        assert_eq!(classify_resource("/agents/{id}/revoke"), "agents");
    }

    #[test]
    fn classify_resource_falls_back_to_other_for_unknown_routes() {
        assert_eq!(classify_resource("/whatever"), "other");
        assert_eq!(classify_resource("/"), "other");
    }
}
