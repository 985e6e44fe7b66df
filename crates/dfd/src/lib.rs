//! # dfd
//!
//! Document forgery classification with Grad-CAM explanations.
//!
//! dfd classifies a document image into one of seven classes (authentic or
//! one of six forgery types) and shows which regions drove the decision:
//!
//! - **Preprocessing**: resize, normalize, adaptive Canny edge map, token ids
//! - **Model**: backbone + CBAM attention fused with edge and token branches
//! - **Explainability**: request-scoped capture, multi-input adapter, Grad-CAM
//! - **Rendering**: jet heatmap blended over the original, PNG + base64
//! - **Service**: upload validation, temp-file staging, attribution fallback
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dfd::prelude::*;
//!
//! let config = ServiceConfig::default().with_model_path("models/forgery_net");
//! let service = ForgeryService::<NdArrayAutodiff>::load(config, Default::default());
//!
//! let upload = Upload::from_path("scan.png", None)?;
//! let response = service.predict(&upload)?;
//! println!("{} ({:.2})", response.prediction.class_name, response.prediction.confidence);
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use dfd_core as core;
pub use dfd_explain as explain;
pub use dfd_infer as infer;
pub use dfd_models as models;
pub use dfd_transforms as transforms;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use dfd::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use dfd_core::{
        FeatureStage, ForgeryClass, ForgeryClassifier, ImportanceMap, ModelInputs, Prediction,
        PreparedInput, Seed, NUM_CLASSES,
    };

    // Models
    pub use dfd_models::{load_forgery_net, save_forgery_net, ForgeryNet, ForgeryNetConfig};

    // Explainability
    pub use dfd_explain::{AttributionError, ClassActivation, GradCam, MultiInputAdapter};

    // Transforms
    pub use dfd_transforms::{OverlayRenderer, Preprocessor};

    // Service
    pub use dfd_infer::{
        ForgeryService, HealthStatus, PredictResponse, ServiceConfig, ServiceError, Upload,
        Visualization,
    };

    // Backend
    #[cfg(feature = "backend-ndarray")]
    pub use dfd_core::backend::{NdArray, NdArrayAutodiff};
}
