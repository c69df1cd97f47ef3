//! Liveness ping and model listing.

use axum::extract::State;
use axum::Json;
use leafscan_inference::ClassLabelList;
use leafscan_models::PlantType;
use serde::Serialize;

use crate::state::AppState;

/// `GET /ping`
pub async fn ping() -> Json<&'static str> {
    Json("Hello, I am alive")
}

/// Loaded plant types and every plant type's class labels.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<PlantType>,
    pub potato_classes: ClassLabelList,
    pub tomato_classes: ClassLabelList,
}

/// `GET /models`
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = state.registry();
    Json(ModelsResponse {
        models: registry.available(),
        potato_classes: registry.class_labels(PlantType::Potato).clone(),
        tomato_classes: registry.class_labels(PlantType::Tomato).clone(),
    })
}
