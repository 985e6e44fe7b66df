//! Service configuration.

use std::path::{Path, PathBuf};

use dfd_core::FeatureStage;
use dfd_explain::GradCam;
use dfd_models::ForgeryNetConfig;
use dfd_transforms::{Normalization, OverlayRenderer, Preprocessor, DEFAULT_ALPHA};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Everything the service needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Checkpoint stem: `<stem>.mpk` weights and `<stem>.json` metadata.
    pub model_path: PathBuf,
    /// Architecture the checkpoint must match.
    pub model: ForgeryNetConfig,
    /// Image normalization constants.
    pub normalization: Normalization,
    /// Heatmap weight in the overlay blend.
    pub overlay_alpha: f32,
    /// Layer attributed by Grad-CAM.
    pub capture_layer: FeatureStage,
    /// `gradcam_shape` reported with the placeholder visualization.
    pub fallback_shape: [usize; 2],
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/forgery_net"),
            model: ForgeryNetConfig::default(),
            normalization: Normalization::default(),
            overlay_alpha: DEFAULT_ALPHA,
            capture_layer: FeatureStage::Backbone,
            fallback_shape: [256, 256],
        }
    }
}

impl ServiceConfig {
    /// Override the checkpoint location.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Override the architecture.
    #[must_use]
    pub fn with_model(mut self, model: ForgeryNetConfig) -> Self {
        self.model = model;
        self
    }

    /// Preprocessor matching the architecture's input size.
    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.model.img_size, self.model.max_tokens)
            .with_normalization(self.normalization)
    }

    /// Overlay renderer.
    pub fn renderer(&self) -> OverlayRenderer {
        OverlayRenderer::new(self.overlay_alpha)
    }

    /// Attribution engine.
    pub fn engine(&self) -> GradCam {
        GradCam::new(self.capture_layer)
    }
}

/// Load a [`ServiceConfig`] from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ServiceError::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_yaml::from_str(&contents)
        .map_err(|e| ServiceError::Config(format!("Failed to parse config YAML: {}", e)))
}
