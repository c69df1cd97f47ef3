//! Application state.

use std::sync::Arc;
use std::time::Instant;

use leafscan_inference::{ModelRegistry, PredictionPipeline};
use leafscan_models::PlantType;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PredictionPipeline>,
    /// Plant types that must be loaded for the service to report ready
    pub required_models: Arc<Vec<PlantType>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        pipeline: PredictionPipeline,
        required_models: Vec<PlantType>,
    ) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            required_models: Arc::new(required_models),
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.pipeline.registry()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
