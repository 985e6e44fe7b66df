//! # dfd_core
//!
//! Core types and traits for document forgery detection.
//!
//! This crate provides:
//! - [`ForgeryClass`] and the fixed wire order of class labels
//! - [`Prediction`] built from a row of classifier logits
//! - [`ImportanceMap`] for rescaled attribution heatmaps
//! - [`PreparedInput`] / [`ModelInputs`] for the three classifier inputs
//! - [`ForgeryClassifier`] trait describing the three-input forward contract
//! - [`Seed`] for deterministic initialization
//! - Error types and backend aliases
//!
//! ## Shape Convention
//!
//! Images follow the burn convention `(N, C, H, W)`:
//! - `N`: batch (always 1 for a request)
//! - `C`: channels (3 for the color tensor, 1 for the edge tensor)
//! - `H`, `W`: both equal to the configured `img_size`
//!
//! Token ids are `(N, T)` with `T` the fixed token sequence length.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod importance;
mod labels;
mod model_trait;
mod prediction;
mod seed;
mod tensor;

pub use error::{CoreError, Result};
pub use importance::ImportanceMap;
pub use labels::{ForgeryClass, NUM_CLASSES};
pub use model_trait::{FeatureStage, ForgeryClassifier, ForwardMode};
pub use prediction::{argmax, softmax, Prediction};
pub use seed::Seed;
pub use tensor::{ModelInputs, PreparedInput};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_autodiff::Autodiff;

    /// CPU backend with gradient tracking, used for the attribution pass.
    #[cfg(feature = "backend-ndarray")]
    pub type NdArrayAutodiff = burn_autodiff::Autodiff<burn_ndarray::NdArray>;
}
