//! Shared data models for the LeafScan service.
//!
//! This crate provides Serde-serializable types for:
//! - Plant type selection and the shipped class label lists
//! - Prediction results returned over the API

pub mod plant;
pub mod prediction;

// Re-export common types
pub use plant::{PlantType, PlantTypeParseError, POTATO_CLASSES, TOMATO_CLASSES};
pub use prediction::PredictionResult;
