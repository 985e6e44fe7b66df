//! Error types for dfd_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in dfd_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Logits row had no entries.
    #[error("Empty logits: cannot build a prediction")]
    EmptyLogits,

    /// Logits contained NaN or infinite values.
    #[error("Non-finite logits: {0:?}")]
    NonFiniteLogits(Vec<f32>),

    /// Class index outside the label table.
    #[error("Unknown class index {index} (expected < {num_classes})")]
    UnknownClass {
        /// Offending index.
        index: usize,
        /// Number of known classes.
        num_classes: usize,
    },

    /// Tensor data could not be read back to the host.
    #[error("Tensor data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
