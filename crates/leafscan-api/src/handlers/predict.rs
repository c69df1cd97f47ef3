//! Prediction handlers.

use std::time::Instant;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Query, State};
use axum::Json;
use leafscan_models::{PlantType, PredictionResult};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

/// Query parameters for `POST /predict`.
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "default_plant_type")]
    pub plant_type: String,
}

fn default_plant_type() -> String {
    PlantType::default().as_str().to_string()
}

/// `POST /predict?plant_type=`
pub async fn predict(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    run_prediction(&state, &query.plant_type, multipart).await
}

/// `POST /predict/potato`
pub async fn predict_potato(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    run_prediction(&state, PlantType::Potato.as_str(), multipart).await
}

/// `POST /predict/tomato`
pub async fn predict_tomato(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    run_prediction(&state, PlantType::Tomato.as_str(), multipart).await
}

/// Plant type and availability are checked before the body is read, and the
/// content type before any decoding.
async fn run_prediction(
    state: &AppState,
    plant_type_raw: &str,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let pipeline = state.pipeline.clone();

    let plant_type = match pipeline.check_plant_type(plant_type_raw) {
        Ok(plant_type) => plant_type,
        Err(e) => {
            metrics::record_prediction(plant_type_raw.parse().ok(), e.kind());
            return Err(e.into());
        }
    };

    let upload = match multipart {
        Ok(mut multipart) => Upload::read(&mut multipart).await?,
        Err(rejection) => {
            debug!(error = %rejection, "Request is not a multipart upload");
            None
        }
    };

    let upload = match upload {
        Some(upload) if upload.is_image() => upload,
        other => {
            debug!(
                content_type = other.as_ref().and_then(|u| u.content_type.as_deref()),
                "Rejected non-image upload"
            );
            metrics::record_prediction(Some(plant_type), "not_an_image");
            return Err(ApiError::not_an_image());
        }
    };

    debug!(
        plant_type = %plant_type,
        file_name = upload.file_name.as_deref(),
        bytes = upload.data.len(),
        "Received upload"
    );

    let threshold = pipeline.confidence_threshold();
    let start = Instant::now();
    let span = tracing::Span::current();
    let result = tokio::task::spawn_blocking(move || {
        span.in_scope(|| pipeline.predict_checked(&upload.data, plant_type, threshold))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Prediction task failed: {}", e)))?;
    metrics::record_inference_duration(plant_type, start.elapsed().as_secs_f64());

    match result {
        Ok(prediction) => {
            metrics::record_prediction(Some(plant_type), "accepted");
            Ok(Json(prediction))
        }
        Err(e) => {
            if !e.is_client_error() {
                warn!(plant_type = %plant_type, error = %e, "Prediction failed");
            }
            metrics::record_prediction(Some(plant_type), e.kind());
            Err(e.into())
        }
    }
}

/// The uploaded image part.
struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl Upload {
    /// Read the first `file` field, skipping any others.
    async fn read(multipart: &mut Multipart) -> ApiResult<Option<Self>> {
        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some(UPLOAD_FIELD) {
                continue;
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?.to_vec();
            return Ok(Some(Self {
                file_name,
                content_type,
                data,
            }));
        }
        Ok(None)
    }

    /// Declared content type is `image/*`.
    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::Upload;

    fn upload(content_type: Option<&str>) -> Upload {
        Upload {
            file_name: Some("leaf.jpg".to_string()),
            content_type: content_type.map(str::to_string),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_is_image() {
        assert!(upload(Some("image/jpeg")).is_image());
        assert!(upload(Some("IMAGE/PNG")).is_image());
        assert!(!upload(Some("text/plain")).is_image());
        assert!(!upload(Some("application/octet-stream")).is_image());
        assert!(!upload(None).is_image());
    }
}
