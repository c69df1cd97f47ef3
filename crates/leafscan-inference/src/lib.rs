//! Leaf image inference pipeline.
//!
//! This crate provides:
//! - Upload decoding to a fixed-size RGB array
//! - Exposure validation before any model runs
//! - ONNX Runtime classifiers behind the `Classifier` trait
//! - A per-plant model registry and its startup loader
//! - The confidence-gated prediction pipeline

pub mod classifier;
pub mod decode;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod validate;

pub use classifier::{Classifier, InputLayout, OnnxClassifier};
pub use decode::{DecodedImage, ImageDecoder};
pub use error::{InferenceError, InferenceResult, ModelUnavailable};
pub use loader::{ModelLoader, ModelLoaderConfig};
pub use pipeline::{argmax, PipelineConfig, PredictionError, PredictionPipeline};
pub use registry::{ClassLabelList, ModelHandle, ModelRegistry, ModelRegistryBuilder};
pub use validate::{LeafImageValidator, RejectionReason, ValidationVerdict, ValidatorConfig};
