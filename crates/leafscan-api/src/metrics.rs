//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use leafscan_models::PlantType;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "leafscan_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "leafscan_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "leafscan_http_requests_in_flight";

    // Prediction metrics
    pub const PREDICTIONS_TOTAL: &str = "leafscan_predictions_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "leafscan_inference_duration_seconds";
    pub const MODELS_LOADED: &str = "leafscan_models_loaded";
}

/// Routes with a fixed label; anything else is bucketed as "other".
const KNOWN_PATHS: &[&str] = &[
    "/predict",
    "/predict/potato",
    "/predict/tomato",
    "/models",
    "/ping",
    "/health",
    "/healthz",
    "/ready",
    "/metrics",
];

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a prediction outcome.
///
/// `plant_type` is `None` when the request named an unsupported plant type.
pub fn record_prediction(plant_type: Option<PlantType>, outcome: &str) {
    let labels = [
        (
            "plant_type",
            plant_type.map_or("unknown", |p| p.as_str()).to_string(),
        ),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::PREDICTIONS_TOTAL, &labels).increment(1);
}

/// Record time spent in decode, validation and inference.
pub fn record_inference_duration(plant_type: PlantType, duration_secs: f64) {
    let labels = [("plant_type", plant_type.as_str().to_string())];
    histogram!(names::INFERENCE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update the loaded-models gauge.
pub fn set_models_loaded(count: usize) {
    gauge!(names::MODELS_LOADED).set(count as f64);
}

/// Collapse a request path into a bounded label value.
fn sanitize_path(path: &str) -> String {
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    if KNOWN_PATHS.contains(&trimmed) {
        trimmed.to_string()
    } else {
        "other".to_string()
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/predict"), "/predict");
        assert_eq!(sanitize_path("/predict/tomato/"), "/predict/tomato");
        assert_eq!(sanitize_path("/predict/banana"), "other");
        assert_eq!(sanitize_path("/wp-admin/login.php"), "other");
        assert_eq!(sanitize_path("/"), "other");
    }
}
