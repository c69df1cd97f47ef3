//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leafscan_inference::PredictionError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Rejection for uploads that are missing or not `image/*`.
    pub fn not_an_image() -> Self {
        Self::BadRequest("Please upload an image file.".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(e) => e.status(),
            ApiError::Prediction(e) => match e {
                PredictionError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                PredictionError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PredictionError::InvalidPlantType(_)
                | PredictionError::ImageDecode(_)
                | PredictionError::ValidationRejected(_)
                | PredictionError::LowConfidence { .. } => StatusCode::BAD_REQUEST,
            },
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_) | ApiError::Prediction(PredictionError::Inference(_))
        )
    }

    /// Message shown to the caller.
    fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg.clone(),
            ApiError::Prediction(e) => e.to_string(),
            ApiError::Multipart(e) => e.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.detail()
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let body = ErrorResponse { detail };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafscan_inference::{ModelUnavailable, RejectionReason};
    use leafscan_models::PlantType;

    #[test]
    fn test_prediction_status_mapping() {
        let cases = [
            (
                PredictionError::InvalidPlantType("banana".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PredictionError::ModelUnavailable(ModelUnavailable(PlantType::Tomato)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PredictionError::ImageDecode("bad magic".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PredictionError::ValidationRejected(RejectionReason::InvalidFormat),
                StatusCode::BAD_REQUEST,
            ),
            (
                PredictionError::LowConfidence {
                    plant_type: PlantType::Potato,
                    label: "Healthy".into(),
                    confidence: 0.3,
                    threshold: 0.5,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                PredictionError::Inference("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_detail_is_user_message() {
        let err = ApiError::from(PredictionError::ImageDecode("bad magic".into()));
        assert_eq!(
            err.detail(),
            "Could not process the image. Please upload a valid image file."
        );
        assert_eq!(ApiError::not_an_image().detail(), "Please upload an image file.");
    }
}
