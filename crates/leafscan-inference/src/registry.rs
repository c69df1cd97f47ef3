//! Loaded classifiers and their class labels, keyed by plant type.
//!
//! Built once at startup and shared behind an `Arc`; nothing in the request
//! path mutates it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use leafscan_models::PlantType;
use serde::Serialize;
use tracing::info;

use crate::classifier::Classifier;
use crate::error::{InferenceError, InferenceResult, ModelUnavailable};

/// Ordered disease names; index `i` names classifier output `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassLabelList(Vec<String>);

impl ClassLabelList {
    pub fn from_static(labels: &[&str]) -> Self {
        Self(labels.iter().map(|l| l.to_string()).collect())
    }

    /// The labels the shipped classifier for `plant_type` was trained with.
    pub fn default_for(plant_type: PlantType) -> Self {
        Self::from_static(plant_type.default_class_labels())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }
}

/// Borrowed view of one registry entry.
#[derive(Clone, Copy)]
pub struct ModelHandle<'a> {
    pub plant_type: PlantType,
    pub classifier: &'a dyn Classifier,
    pub labels: &'a ClassLabelList,
}

pub struct ModelRegistry {
    models: HashMap<PlantType, Arc<dyn Classifier>>,
    labels: HashMap<PlantType, ClassLabelList>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("available", &self.available())
            .finish()
    }
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::new()
    }

    /// Registry with default labels and no classifiers loaded.
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
            labels: default_labels(),
        }
    }

    pub fn is_available(&self, plant_type: PlantType) -> bool {
        self.models.contains_key(&plant_type)
    }

    /// Classifier and labels for a plant type.
    pub fn get(&self, plant_type: PlantType) -> Result<ModelHandle<'_>, ModelUnavailable> {
        let classifier = self
            .models
            .get(&plant_type)
            .ok_or(ModelUnavailable(plant_type))?;
        let labels = self
            .labels
            .get(&plant_type)
            .ok_or(ModelUnavailable(plant_type))?;

        Ok(ModelHandle {
            plant_type,
            classifier: classifier.as_ref(),
            labels,
        })
    }

    /// Labels for a plant type, whether or not its classifier is loaded.
    pub fn class_labels(&self, plant_type: PlantType) -> &ClassLabelList {
        // The builder always seeds every plant type.
        &self.labels[&plant_type]
    }

    /// Plant types with a loaded classifier, in declaration order.
    pub fn available(&self) -> Vec<PlantType> {
        PlantType::ALL
            .iter()
            .copied()
            .filter(|p| self.is_available(*p))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn default_labels() -> HashMap<PlantType, ClassLabelList> {
    PlantType::ALL
        .iter()
        .map(|p| (*p, ClassLabelList::default_for(*p)))
        .collect()
}

/// Assembles a [`ModelRegistry`], checking each classifier's output width
/// against its label list.
pub struct ModelRegistryBuilder {
    models: HashMap<PlantType, Arc<dyn Classifier>>,
    labels: HashMap<PlantType, ClassLabelList>,
}

impl Default for ModelRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistryBuilder {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            labels: default_labels(),
        }
    }

    /// Replace the label list for a plant type.
    pub fn labels(mut self, plant_type: PlantType, labels: ClassLabelList) -> Self {
        self.labels.insert(plant_type, labels);
        self
    }

    pub fn classifier(mut self, plant_type: PlantType, classifier: Arc<dyn Classifier>) -> Self {
        self.models.insert(plant_type, classifier);
        self
    }

    pub fn build(self) -> InferenceResult<ModelRegistry> {
        for (plant_type, classifier) in &self.models {
            let labels = self.labels[plant_type].len();
            if let Some(outputs) = classifier.num_classes() {
                if outputs != labels {
                    return Err(InferenceError::LabelMismatch {
                        plant_type: *plant_type,
                        outputs,
                        labels,
                    });
                }
            }
        }

        let registry = ModelRegistry {
            models: self.models,
            labels: self.labels,
        };
        info!(available = ?registry.available(), "Model registry ready");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedImage;

    struct FixedClassifier {
        outputs: usize,
    }

    impl Classifier for FixedClassifier {
        fn classify(&self, _image: &DecodedImage) -> InferenceResult<Vec<f32>> {
            Ok(vec![1.0 / self.outputs as f32; self.outputs])
        }

        fn num_classes(&self) -> Option<usize> {
            Some(self.outputs)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_empty_registry_still_has_labels() {
        let registry = ModelRegistry::empty();
        assert!(registry.is_empty());
        assert!(!registry.is_available(PlantType::Potato));
        assert_eq!(registry.class_labels(PlantType::Potato).len(), 3);
        assert_eq!(registry.class_labels(PlantType::Tomato).len(), 10);
        assert_eq!(
            registry.get(PlantType::Tomato).err(),
            Some(ModelUnavailable(PlantType::Tomato))
        );
    }

    #[test]
    fn test_partial_registry() {
        let registry = ModelRegistry::builder()
            .classifier(PlantType::Potato, Arc::new(FixedClassifier { outputs: 3 }))
            .build()
            .unwrap();

        assert!(registry.is_available(PlantType::Potato));
        assert!(!registry.is_available(PlantType::Tomato));
        assert_eq!(registry.available(), vec![PlantType::Potato]);

        let handle = registry.get(PlantType::Potato).unwrap();
        assert_eq!(handle.labels.get(0), Some("Early Blight"));
        assert_eq!(handle.classifier.name(), "fixed");
    }

    #[test]
    fn test_label_mismatch_rejected() {
        let err = ModelRegistry::builder()
            .classifier(PlantType::Tomato, Arc::new(FixedClassifier { outputs: 3 }))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::LabelMismatch {
                plant_type: PlantType::Tomato,
                outputs: 3,
                labels: 10
            }
        ));
    }

    #[test]
    fn test_custom_labels() {
        let registry = ModelRegistry::builder()
            .labels(PlantType::Potato, ClassLabelList::from_static(&["a", "b"]))
            .classifier(PlantType::Potato, Arc::new(FixedClassifier { outputs: 2 }))
            .build()
            .unwrap();
        assert!(registry.class_labels(PlantType::Potato).contains("b"));
        assert!(!registry.class_labels(PlantType::Potato).contains("Healthy"));
    }

    #[test]
    fn test_available_is_ordered() {
        let registry = ModelRegistry::builder()
            .classifier(PlantType::Tomato, Arc::new(FixedClassifier { outputs: 10 }))
            .classifier(PlantType::Potato, Arc::new(FixedClassifier { outputs: 3 }))
            .build()
            .unwrap();
        assert_eq!(registry.available(), vec![PlantType::Potato, PlantType::Tomato]);
        assert_eq!(registry.len(), 2);
    }
}
