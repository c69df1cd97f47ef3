//! Plant type selector.
//!
//! Each plant type owns exactly one classifier and one ordered label list.
//! Adding a plant means adding a variant here plus a registry entry; nothing
//! in the request path branches on plant names.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Disease classes of the potato classifier, in output order.
pub const POTATO_CLASSES: &[&str] = &["Early Blight", "Late Blight", "Healthy"];

/// Disease classes of the tomato classifier, in output order.
pub const TOMATO_CLASSES: &[&str] = &[
    "Bacterial Spot",
    "Early Blight",
    "Healthy",
    "Late Blight",
    "Leaf Mold",
    "Septoria Leaf Spot",
    "Spider Mites (Two-spotted)",
    "Target Spot",
    "Tomato Mosaic Virus",
    "Yellow Leaf Curl Virus",
];

/// Plant whose leaf is being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlantType {
    #[default]
    Potato,
    Tomato,
}

impl PlantType {
    /// All supported plant types, in declaration order.
    pub const ALL: &'static [PlantType] = &[PlantType::Potato, PlantType::Tomato];

    /// Returns the plant type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantType::Potato => "potato",
            PlantType::Tomato => "tomato",
        }
    }

    /// Capitalized name for user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlantType::Potato => "Potato",
            PlantType::Tomato => "Tomato",
        }
    }

    /// The label list the shipped classifier for this plant was trained with.
    pub fn default_class_labels(&self) -> &'static [&'static str] {
        match self {
            PlantType::Potato => POTATO_CLASSES,
            PlantType::Tomato => TOMATO_CLASSES,
        }
    }
}

impl fmt::Display for PlantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlantType {
    type Err = PlantTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "potato" => Ok(PlantType::Potato),
            "tomato" => Ok(PlantType::Tomato),
            _ => Err(PlantTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown plant type: {0}")]
pub struct PlantTypeParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_parse_is_case_insensitive() {
        assert_eq!("potato".parse::<PlantType>().unwrap(), PlantType::Potato);
        assert_eq!("POTATO".parse::<PlantType>().unwrap(), PlantType::Potato);
        assert_eq!("Tomato".parse::<PlantType>().unwrap(), PlantType::Tomato);
        assert_eq!(" tomato ".parse::<PlantType>().unwrap(), PlantType::Tomato);
    }

    #[test]
    fn test_plant_parse_rejects_unknown() {
        let err = "banana".parse::<PlantType>().unwrap_err();
        assert_eq!(err, PlantTypeParseError("banana".to_string()));
        assert!("".parse::<PlantType>().is_err());
    }

    #[test]
    fn test_plant_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&PlantType::Tomato).unwrap(), "\"tomato\"");
        let parsed: PlantType = serde_json::from_str("\"potato\"").unwrap();
        assert_eq!(parsed, PlantType::Potato);
    }

    #[test]
    fn test_default_labels() {
        assert_eq!(PlantType::Potato.default_class_labels().len(), 3);
        assert_eq!(PlantType::Tomato.default_class_labels().len(), 10);
        assert_eq!(PlantType::Tomato.default_class_labels()[2], "Healthy");
    }
}
