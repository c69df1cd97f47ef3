//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{health, list_models, ping, predict, predict_potato, predict_tomato, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let max_body_size = state.config.max_body_size;

    let predict_routes = Router::new()
        .route("/predict", post(predict))
        // Legacy per-plant endpoints
        .route("/predict/potato", post(predict_potato))
        .route("/predict/tomato", post(predict_tomato));

    let model_routes = Router::new()
        .route("/ping", get(ping))
        .route("/models", get(list_models));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(predict_routes)
        .merge(model_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Enforced while the multipart stream is read, so oversized uploads get
        // a 413 with or without a Content-Length header
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
