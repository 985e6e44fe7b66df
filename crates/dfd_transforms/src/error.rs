//! Errors for image decoding, preprocessing and rendering.

use thiserror::Error;

/// Client-side input errors: the upload cannot become model inputs.
#[derive(Error, Debug)]
pub enum InputError {
    /// Upload is not declared as an image.
    #[error("unsupported content type {0:?}: expected image/*")]
    UnsupportedContentType(String),

    /// Upload carries no bytes.
    #[error("empty upload")]
    Empty,

    /// Bytes are not a decodable image.
    #[error("cannot decode image: {0}")]
    Decode(String),

    /// Prepared tensors are inconsistent.
    #[error(transparent)]
    Tensor(#[from] dfd_core::CoreError),

    /// Reading a staged upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while producing the overlay visualization.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Map values do not fit the declared dimensions.
    #[error("heatmap of {values} values does not fit {width}x{height}")]
    Shape {
        /// Number of values in the map.
        values: usize,
        /// Target width.
        width: u32,
        /// Target height.
        height: u32,
    },

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// Base64 or PNG decoding failed.
    #[error("overlay decoding failed: {0}")]
    Decode(String),
}
