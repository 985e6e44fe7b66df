//! # dfd_infer
//!
//! Request orchestration for document forgery detection.
//!
//! [`ForgeryService`] validates an [`Upload`], stages it to a temporary
//! file, preprocesses it, classifies it, and attributes the prediction with
//! Grad-CAM. If attribution fails the response still carries the real
//! prediction, with [`FALLBACK_PNG`] as the visualization.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dfd_infer::{load_config, ForgeryService, Upload};
//!
//! let config = load_config(Path::new("dfd.yaml"))?;
//! let service = ForgeryService::<Autodiff<NdArray>>::load(config, Default::default());
//! let response = service.predict(&Upload::from_path("scan.png", None)?)?;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod response;
pub mod service;
pub mod upload;

pub use config::{load_config, ServiceConfig};
pub use error::{Result, ServiceError};
pub use response::{HealthStatus, PredictResponse, Visualization, FALLBACK_PNG, MODE_ML};
pub use service::{Attribution, ForgeryService};
pub use upload::{guess_content_type, validate_content_type, StagedUpload, Upload};
