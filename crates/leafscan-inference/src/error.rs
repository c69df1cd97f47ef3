//! Error types for decoding, model loading and inference.

use leafscan_models::PlantType;
use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors raised below the prediction pipeline.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The bytes could not be parsed as any supported image format.
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("{plant_type} classifier produces {outputs} outputs but has {labels} class labels")]
    LabelMismatch {
        plant_type: PlantType,
        outputs: usize,
        labels: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    /// Create an image decode error.
    pub fn image_decode(message: impl Into<String>) -> Self {
        Self::ImageDecode(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a model load error.
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }
}

/// Requested plant type has no loaded classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} model not available.", .0.display_name())]
pub struct ModelUnavailable(pub PlantType);
