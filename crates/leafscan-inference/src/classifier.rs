//! Leaf disease classifiers.
//!
//! The pipeline only sees the [`Classifier`] trait, so tests and alternative
//! runtimes can stand in for the ONNX Runtime implementation.
//!
//! Notes:
//! - The shipped models are Keras exports whose first layer rescales raw
//!   0-255 pixels, so inputs are fed unnormalized.
//! - Keras graphs take NHWC input; [`InputLayout::Nchw`] covers exports that
//!   were transposed on conversion.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decode::DecodedImage;
use crate::error::{InferenceError, InferenceResult};

/// Trait for per-plant image classifiers.
pub trait Classifier: Send + Sync {
    /// Run the model on one image and return its output distribution over
    /// the class labels.
    fn classify(&self, image: &DecodedImage) -> InferenceResult<Vec<f32>>;

    /// Output dimensionality, when known ahead of inference.
    fn num_classes(&self) -> Option<usize> {
        None
    }

    /// Classifier name for logging.
    fn name(&self) -> &str;
}

/// Memory layout of the model's image input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[1, H, W, 3]`
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

impl fmt::Display for InputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputLayout::Nhwc => f.write_str("nhwc"),
            InputLayout::Nchw => f.write_str("nchw"),
        }
    }
}

impl FromStr for InputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nhwc" => Ok(InputLayout::Nhwc),
            "nchw" => Ok(InputLayout::Nchw),
            other => Err(format!("Unknown input layout: {other}")),
        }
    }
}

/// Flatten an RGB image into a float tensor buffer with the given layout.
///
/// Pixel values are kept on the 0-255 scale.
pub fn image_to_tensor_data(image: &DecodedImage, layout: InputLayout) -> (Vec<usize>, Vec<f32>) {
    let (h, w, c) = image.pixels().dim();
    match layout {
        InputLayout::Nhwc => {
            let data = image.pixels().iter().map(|&v| f32::from(v)).collect();
            (vec![1, h, w, c], data)
        }
        InputLayout::Nchw => {
            let data = image
                .pixels()
                .view()
                .permuted_axes([2, 0, 1])
                .iter()
                .map(|&v| f32::from(v))
                .collect();
            (vec![1, c, h, w], data)
        }
    }
}

/// ONNX Runtime-backed classifier.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
    layout: InputLayout,
    num_classes: usize,
    name: String,
}

impl OnnxClassifier {
    /// Load a model and run one warm-up inference on a blank
    /// `input_size x input_size` image to learn its output width.
    pub fn load(model_path: &Path, layout: InputLayout, input_size: u32) -> InferenceResult<Self> {
        if !model_path.exists() {
            return Err(InferenceError::model_not_found(
                model_path.display().to_string(),
            ));
        }

        let session = create_session(model_path)?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferenceError::model_load("model declares no outputs"))?;

        let name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_path.display().to_string());

        let mut classifier = Self {
            session: Mutex::new(session),
            output_name,
            layout,
            num_classes: 0,
            name,
        };

        let warmup = classifier.run(&DecodedImage::uniform(input_size, [0, 0, 0]))?;
        if warmup.is_empty() {
            return Err(InferenceError::model_load("model produced an empty output"));
        }
        classifier.num_classes = warmup.len();

        info!(
            model_path = %model_path.display(),
            layout = %layout,
            input_size = input_size,
            num_classes = classifier.num_classes,
            "Classifier loaded"
        );

        Ok(classifier)
    }

    fn run(&self, image: &DecodedImage) -> InferenceResult<Vec<f32>> {
        let (shape, data) = image_to_tensor_data(image, self.layout);
        let input: Value = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::inference_failed(format!("Failed to create tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::inference_failed("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::inference_failed(format!("ONNX inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::inference_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, probabilities) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("Failed to extract tensor: {e}")))?;

        debug!(model = %self.name, outputs = probabilities.len(), "Inference completed");

        Ok(probabilities.to_vec())
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &DecodedImage) -> InferenceResult<Vec<f32>> {
        self.run(image)
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.num_classes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Create an ONNX Runtime session with full graph optimization.
fn create_session(model_path: &Path) -> InferenceResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    Session::builder()
        .map_err(|e| InferenceError::model_load(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::model_load(format!("Failed to set optimization level: {e}")))?
        .commit_from_memory(model_bytes.as_slice())
        .map_err(|e| InferenceError::model_load(format!("Failed to load model: {e}")))
}
