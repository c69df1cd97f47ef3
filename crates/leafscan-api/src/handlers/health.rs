//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use leafscan_models::PlantType;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
}

/// Health check endpoint (liveness).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub models: Vec<ModelCheck>,
}

/// Load state of one plant type's classifier.
#[derive(Serialize)]
pub struct ModelCheck {
    pub plant_type: PlantType,
    pub status: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
}

/// Readiness check endpoint (readiness).
///
/// Ready once every required plant type has a classifier and at least one
/// classifier is loaded.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let registry = state.registry();

    let models: Vec<ModelCheck> = PlantType::ALL
        .iter()
        .map(|&plant_type| {
            let loaded = registry.is_available(plant_type);
            ModelCheck {
                plant_type,
                status: if loaded { "loaded" } else { "unavailable" }.to_string(),
                required: state.required_models.contains(&plant_type),
                num_classes: loaded.then(|| registry.class_labels(plant_type).len()),
            }
        })
        .collect();

    let all_ok = !registry.is_empty()
        && models.iter().all(|m| !m.required || m.status == "loaded");

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        models,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
