//! Startup model discovery.
//!
//! Each plant type has an ordered list of candidate model files: an explicit
//! override, the exported SavedModel location, then the packaged training
//! artifact. The first existing file wins. A plant type with no file is left
//! unavailable unless it is marked as required.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use leafscan_models::PlantType;
use tracing::{info, warn};

use crate::classifier::{Classifier, InputLayout, OnnxClassifier};
use crate::decode::ImageDecoder;
use crate::error::{InferenceError, InferenceResult};
use crate::registry::ModelRegistry;

/// Where to look for classifier files.
#[derive(Debug, Clone)]
pub struct ModelLoaderConfig {
    /// Base directory for the relative candidate paths
    pub models_dir: PathBuf,
    /// Explicit model path per plant type, tried before the defaults
    pub overrides: HashMap<PlantType, PathBuf>,
    /// Plant types whose absence aborts startup
    pub required: Vec<PlantType>,
    /// Input tensor layout of the exported models
    pub input_layout: InputLayout,
    /// Side length of the square model input
    pub input_size: u32,
}

impl Default for ModelLoaderConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("."),
            overrides: HashMap::new(),
            required: vec![PlantType::Potato],
            input_layout: InputLayout::Nhwc,
            input_size: ImageDecoder::DEFAULT_SIZE,
        }
    }
}

impl ModelLoaderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut overrides = HashMap::new();
        for plant_type in PlantType::ALL {
            let var = format!("LEAFSCAN_{}_MODEL", plant_type.as_str().to_uppercase());
            if let Ok(path) = std::env::var(&var) {
                if !path.trim().is_empty() {
                    overrides.insert(*plant_type, PathBuf::from(path.trim()));
                }
            }
        }

        Self {
            models_dir: std::env::var("LEAFSCAN_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            overrides,
            required: std::env::var("LEAFSCAN_REQUIRED_MODELS")
                .map(|s| parse_plant_list(&s))
                .unwrap_or_else(|_| vec![PlantType::Potato]),
            input_layout: std::env::var("LEAFSCAN_INPUT_LAYOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            input_size: std::env::var("LEAFSCAN_IMAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(ImageDecoder::DEFAULT_SIZE),
        }
    }

    /// Candidate model files for a plant type, in search order.
    pub fn candidates(&self, plant_type: PlantType) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = self.overrides.get(&plant_type) {
            candidates.push(path.clone());
        }
        let defaults: &[&str] = match plant_type {
            PlantType::Potato => &["saved_models/1/model.onnx", "training/potatoes.onnx"],
            PlantType::Tomato => &["saved_models/tomato/2/model.onnx", "training/tomatoes.onnx"],
        };
        candidates.extend(defaults.iter().map(|p| self.models_dir.join(p)));
        candidates
    }

    /// First existing candidate for a plant type.
    pub fn resolve(&self, plant_type: PlantType) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&plant_type) {
            if !path.is_file() {
                warn!(
                    plant_type = %plant_type,
                    path = %path.display(),
                    "Configured {} model not found, trying default locations",
                    plant_type.display_name()
                );
            }
        }
        self.candidates(plant_type).into_iter().find(|p| p.is_file())
    }

    pub fn is_required(&self, plant_type: PlantType) -> bool {
        self.required.contains(&plant_type)
    }
}

/// Parse a comma-separated plant list, skipping unknown entries.
fn parse_plant_list(s: &str) -> Vec<PlantType> {
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .filter_map(|p| match p.parse::<PlantType>() {
            Ok(plant_type) => Some(plant_type),
            Err(e) => {
                warn!("Ignoring required model entry: {}", e);
                None
            }
        })
        .collect()
}

/// Builds the [`ModelRegistry`] from files on disk.
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    config: ModelLoaderConfig,
}

impl ModelLoader {
    pub fn new(config: ModelLoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelLoaderConfig {
        &self.config
    }

    /// Load every available plant type with ONNX Runtime.
    pub fn load(&self) -> InferenceResult<ModelRegistry> {
        let layout = self.config.input_layout;
        let input_size = self.config.input_size;
        self.load_with(|_, path| {
            let classifier = OnnxClassifier::load(path, layout, input_size)?;
            Ok(Arc::new(classifier) as Arc<dyn Classifier>)
        })
    }

    /// Walk the candidates and load each found file with `load_fn`.
    ///
    /// A found file that fails to load is always fatal; a missing file is
    /// fatal only for required plant types.
    pub fn load_with<F>(&self, mut load_fn: F) -> InferenceResult<ModelRegistry>
    where
        F: FnMut(PlantType, &Path) -> InferenceResult<Arc<dyn Classifier>>,
    {
        let mut builder = ModelRegistry::builder();

        for plant_type in PlantType::ALL.iter().copied() {
            match self.config.resolve(plant_type) {
                Some(path) => {
                    let classifier = load_fn(plant_type, &path)?;
                    info!(
                        plant_type = %plant_type,
                        path = %path.display(),
                        "{} model loaded",
                        plant_type.display_name()
                    );
                    builder = builder.classifier(plant_type, classifier);
                }
                None if self.config.is_required(plant_type) => {
                    let searched = self
                        .config
                        .candidates(plant_type)
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(InferenceError::model_not_found(format!(
                        "{} model is required; searched {}",
                        plant_type.display_name(),
                        searched
                    )));
                }
                None => {
                    warn!(
                        plant_type = %plant_type,
                        "{} model not found, plant type unavailable",
                        plant_type.display_name()
                    );
                }
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedImage;
    use std::fs;

    struct StubClassifier(usize);

    impl Classifier for StubClassifier {
        fn classify(&self, _image: &DecodedImage) -> InferenceResult<Vec<f32>> {
            Ok(vec![0.0; self.0])
        }

        fn num_classes(&self) -> Option<usize> {
            Some(self.0)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn stub_loader(plant_type: PlantType, _path: &Path) -> InferenceResult<Arc<dyn Classifier>> {
        Ok(Arc::new(StubClassifier(plant_type.default_class_labels().len())))
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"onnx").unwrap();
    }

    fn config_for(dir: &Path) -> ModelLoaderConfig {
        ModelLoaderConfig {
            models_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_candidates_order() {
        let mut config = config_for(Path::new("/models"));
        config
            .overrides
            .insert(PlantType::Tomato, PathBuf::from("/custom/tomato.onnx"));

        assert_eq!(
            config.candidates(PlantType::Tomato),
            vec![
                PathBuf::from("/custom/tomato.onnx"),
                PathBuf::from("/models/saved_models/tomato/2/model.onnx"),
                PathBuf::from("/models/training/tomatoes.onnx"),
            ]
        );
        assert_eq!(config.candidates(PlantType::Potato).len(), 2);
    }

    #[test]
    fn test_primary_preferred_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("saved_models/1/model.onnx");
        let fallback = dir.path().join("training/potatoes.onnx");
        touch(&fallback);

        let config = config_for(dir.path());
        assert_eq!(config.resolve(PlantType::Potato), Some(fallback));

        touch(&primary);
        assert_eq!(config.resolve(PlantType::Potato), Some(primary));
    }

    #[test]
    fn test_missing_override_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("training/potatoes.onnx");
        touch(&fallback);

        let mut config = config_for(dir.path());
        config
            .overrides
            .insert(PlantType::Potato, dir.path().join("custom/missing.onnx"));
        assert_eq!(config.resolve(PlantType::Potato), Some(fallback));

        let custom = dir.path().join("custom/potato.onnx");
        touch(&custom);
        config.overrides.insert(PlantType::Potato, custom.clone());
        assert_eq!(config.resolve(PlantType::Potato), Some(custom));
    }

    #[test]
    fn test_missing_optional_model_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("training/potatoes.onnx"));

        let mut loaded = Vec::new();
        let registry = ModelLoader::new(config_for(dir.path()))
            .load_with(|plant_type, path| {
                loaded.push((plant_type, path.to_path_buf()));
                stub_loader(plant_type, path)
            })
            .unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(registry.is_available(PlantType::Potato));
        assert!(!registry.is_available(PlantType::Tomato));
        assert_eq!(registry.class_labels(PlantType::Tomato).len(), 10);
    }

    #[test]
    fn test_missing_required_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("saved_models/tomato/2/model.onnx"));

        let err = ModelLoader::new(config_for(dir.path()))
            .load_with(stub_loader)
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
        assert!(err.to_string().contains("Potato model is required"));
    }

    #[test]
    fn test_nothing_required() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelLoaderConfig {
            required: Vec::new(),
            ..config_for(dir.path())
        };

        let registry = ModelLoader::new(config).load_with(stub_loader).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_failure_of_found_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("training/potatoes.onnx"));
        touch(&dir.path().join("training/tomatoes.onnx"));

        let err = ModelLoader::new(config_for(dir.path()))
            .load_with(|plant_type, path| match plant_type {
                PlantType::Tomato => Err(InferenceError::model_load("corrupt graph")),
                _ => stub_loader(plant_type, path),
            })
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoad(_)));
    }

    #[test]
    fn test_parse_plant_list() {
        assert_eq!(
            parse_plant_list("potato, TOMATO"),
            vec![PlantType::Potato, PlantType::Tomato]
        );
        assert_eq!(parse_plant_list("banana,potato"), vec![PlantType::Potato]);
        assert!(parse_plant_list("").is_empty());
    }
}
