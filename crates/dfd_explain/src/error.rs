//! Attribution errors.

use dfd_core::FeatureStage;
use thiserror::Error;

/// Result type for attribution operations.
pub type Result<T> = std::result::Result<T, AttributionError>;

/// Errors raised while computing a class activation map.
///
/// All of these are recoverable from the caller's point of view: the
/// classification that preceded the attribution pass is still valid.
#[derive(Error, Debug)]
pub enum AttributionError {
    /// The designated layer never produced an output during the forward pass.
    #[error("no activation captured at {layer:?}: the layer was not reached")]
    MissingActivation {
        /// The designated layer.
        layer: FeatureStage,
    },

    /// The designated layer is not on the path to the target score.
    #[error("no gradient captured at {layer:?}: the layer is detached from the target score")]
    MissingGradient {
        /// The designated layer.
        layer: FeatureStage,
    },

    /// Requested class index is outside the logits row.
    #[error("target class {class} out of range for {num_classes} classes")]
    InvalidTarget {
        /// Requested class.
        class: usize,
        /// Number of logits.
        num_classes: usize,
    },

    /// Activation and gradient captures disagree in shape.
    #[error("capture shape mismatch: activation {activation:?}, gradient {gradient:?}")]
    ShapeMismatch {
        /// Activation dims.
        activation: Vec<usize>,
        /// Gradient dims.
        gradient: Vec<usize>,
    },

    /// Tensor data could not be brought to the host.
    #[error("tensor data error: {0}")]
    Data(String),
}
