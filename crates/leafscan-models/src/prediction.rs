//! Prediction result returned to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plant::PlantType;

/// Accepted prediction for one uploaded leaf image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionResult {
    /// Predicted disease label.
    #[serde(rename = "class")]
    pub label: String,
    /// Maximum class probability, in [0, 1].
    pub confidence: f32,
    /// Plant type whose classifier produced the prediction.
    pub plant_type: PlantType,
}

impl PredictionResult {
    pub fn new(label: impl Into<String>, confidence: f32, plant_type: PlantType) -> Self {
        Self {
            label: label.into(),
            confidence,
            plant_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let result = PredictionResult::new("Late Blight", 0.75, PlantType::Potato);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["class"], "Late Blight");
        assert_eq!(json["confidence"], 0.75);
        assert_eq!(json["plant_type"], "potato");
        assert!(json.get("label").is_none());
    }
}
