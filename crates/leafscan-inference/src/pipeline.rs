//! Per-request prediction pipeline.
//!
//! Steps run in a fixed order and each one short-circuits:
//! plant type -> availability -> decode -> validate -> inference -> confidence gate.

use std::sync::Arc;
use std::time::Instant;

use leafscan_models::{PlantType, PredictionResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::ImageDecoder;
use crate::error::{InferenceError, ModelUnavailable};
use crate::registry::ModelRegistry;
use crate::validate::{LeafImageValidator, RejectionReason, ValidationVerdict, ValidatorConfig};

/// Tolerance for probabilities that drift just outside [0, 1].
const PROBABILITY_EPSILON: f32 = 1e-4;

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Side length of the decoded square image
    pub image_size: u32,
    /// Brightness limits for the validator
    pub validator: ValidatorConfig,
    /// Minimum accepted confidence
    pub confidence_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_size: ImageDecoder::DEFAULT_SIZE,
            validator: ValidatorConfig::default(),
            confidence_threshold: 0.50,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_size: std::env::var("LEAFSCAN_IMAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.image_size),
            validator: ValidatorConfig::from_bounds(
                env_f64("LEAFSCAN_MIN_BRIGHTNESS"),
                env_f64("LEAFSCAN_MAX_BRIGHTNESS"),
            ),
            confidence_threshold: std::env::var("LEAFSCAN_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0))
                .unwrap_or(defaults.confidence_threshold),
        }
    }
}

fn env_f64(var: &str) -> Option<f64> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

/// Reasons a prediction request did not produce a result.
///
/// Display strings are the user-facing messages.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Invalid plant type. Use 'potato' or 'tomato'.")]
    InvalidPlantType(String),

    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),

    /// The upload is not a decodable image; the payload is the decoder cause.
    #[error("Could not process the image. Please upload a valid image file.")]
    ImageDecode(String),

    #[error("{0}")]
    ValidationRejected(RejectionReason),

    #[error("This doesn't look like a {plant_type} leaf. Please upload a clear photo.")]
    LowConfidence {
        plant_type: PlantType,
        label: String,
        confidence: f32,
        threshold: f32,
    },

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PredictionError {
    /// Short tag for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::InvalidPlantType(_) => "invalid_plant_type",
            PredictionError::ModelUnavailable(_) => "model_unavailable",
            PredictionError::ImageDecode(_) => "image_decode",
            PredictionError::ValidationRejected(reason) => reason.as_str(),
            PredictionError::LowConfidence { .. } => "low_confidence",
            PredictionError::Inference(_) => "inference",
        }
    }

    /// True for failures caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PredictionError::ModelUnavailable(_) | PredictionError::Inference(_)
        )
    }
}

impl From<InferenceError> for PredictionError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ImageDecode(cause) => PredictionError::ImageDecode(cause),
            other => PredictionError::Inference(other.to_string()),
        }
    }
}

/// Index and value of the largest entry; the first maximum wins ties.
///
/// Returns `None` for an empty slice or one containing NaN.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            return None;
        }
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Orchestrates decode, validation, dispatch and the confidence gate.
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    registry: Arc<ModelRegistry>,
    decoder: ImageDecoder,
    validator: LeafImageValidator,
    confidence_threshold: f32,
}

impl PredictionPipeline {
    pub fn new(registry: Arc<ModelRegistry>, config: PipelineConfig) -> Self {
        Self {
            registry,
            decoder: ImageDecoder::new(config.image_size),
            validator: LeafImageValidator::new(config.validator),
            confidence_threshold: config.confidence_threshold,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Configured default threshold for the confidence gate.
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Parse the plant selector and make sure its classifier is loaded.
    pub fn check_plant_type(&self, plant_type_raw: &str) -> Result<PlantType, PredictionError> {
        let plant_type: PlantType = plant_type_raw
            .parse()
            .map_err(|_| PredictionError::InvalidPlantType(plant_type_raw.to_string()))?;

        if !self.registry.is_available(plant_type) {
            return Err(ModelUnavailable(plant_type).into());
        }
        Ok(plant_type)
    }

    /// Run the full pipeline on an upload.
    pub fn predict(
        &self,
        bytes: &[u8],
        plant_type_raw: &str,
        confidence_threshold: f32,
    ) -> Result<PredictionResult, PredictionError> {
        let plant_type = self.check_plant_type(plant_type_raw)?;
        self.predict_checked(bytes, plant_type, confidence_threshold)
    }

    /// Run the pipeline for an already parsed plant type.
    pub fn predict_checked(
        &self,
        bytes: &[u8],
        plant_type: PlantType,
        confidence_threshold: f32,
    ) -> Result<PredictionResult, PredictionError> {
        if !self.registry.is_available(plant_type) {
            return Err(ModelUnavailable(plant_type).into());
        }

        let image = self.decoder.decode(bytes)?;

        match self.validator.check(&image) {
            ValidationVerdict::Accepted { brightness } => {
                debug!(plant_type = %plant_type, brightness, "Image passed validation");
            }
            ValidationVerdict::Rejected(reason) => {
                info!(plant_type = %plant_type, reason = reason.as_str(), "Image rejected");
                return Err(PredictionError::ValidationRejected(reason));
            }
        }

        let model = self.registry.get(plant_type)?;

        info!(plant_type = %plant_type, model = model.classifier.name(), "Predicting with {} model", plant_type);
        let start = Instant::now();
        let probabilities = model.classifier.classify(&image)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if probabilities.len() != model.labels.len() {
            return Err(PredictionError::Inference(format!(
                "{} classifier returned {} scores for {} labels",
                plant_type,
                probabilities.len(),
                model.labels.len()
            )));
        }
        if probabilities
            .iter()
            .any(|p| !p.is_finite() || *p < -PROBABILITY_EPSILON || *p > 1.0 + PROBABILITY_EPSILON)
        {
            return Err(PredictionError::Inference(format!(
                "{} classifier returned values outside [0, 1]",
                plant_type
            )));
        }

        let (index, max) = argmax(&probabilities)
            .ok_or_else(|| PredictionError::Inference("empty probability vector".to_string()))?;
        let confidence = max.clamp(0.0, 1.0);
        let label = model
            .labels
            .get(index)
            .ok_or_else(|| PredictionError::Inference(format!("no label at index {index}")))?
            .to_string();

        info!(
            plant_type = %plant_type,
            label = %label,
            confidence = confidence,
            inference_ms = elapsed_ms,
            "Result: {} ({:.1}%)",
            label,
            confidence * 100.0
        );

        if confidence < confidence_threshold {
            warn!(
                plant_type = %plant_type,
                confidence = confidence,
                threshold = confidence_threshold,
                "Prediction below confidence threshold"
            );
            return Err(PredictionError::LowConfidence {
                plant_type,
                label,
                confidence,
                threshold: confidence_threshold,
            });
        }

        Ok(PredictionResult::new(label, confidence, plant_type))
    }
}
