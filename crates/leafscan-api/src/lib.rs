//! Axum HTTP API for leaf disease classification.
//!
//! This crate provides:
//! - Multipart image upload and prediction endpoints
//! - Model listing, liveness and readiness checks
//! - Security headers, request IDs and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
