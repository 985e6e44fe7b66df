//! # dfd_transforms
//!
//! Image-side stages of the forgery detection pipeline.
//!
//! This crate provides:
//! - [`Preprocessor`]: decode, resize, normalize, adaptive Canny edges, zero token ids
//! - [`OverlayRenderer`]: jet colormap, alpha blend, PNG + base64 encoding
//!
//! ## Example
//!
//! ```rust,ignore
//! use dfd_transforms::{OverlayRenderer, Preprocessor};
//!
//! let image = Preprocessor::decode(&bytes)?;
//! let prepared = Preprocessor::new(256, 64).prepare(&image)?;
//! // ... classify and attribute ...
//! let overlay = OverlayRenderer::default().render(&image, &map)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod colormap;
pub mod error;
pub mod preprocess;
pub mod render;

pub use colormap::jet;
pub use error::{InputError, RenderError};
pub use preprocess::{
    adaptive_thresholds, edge_map, grayscale, median_intensity, Normalization, Preprocessor,
};
pub use render::{
    decode_png_base64, encode_png_base64, heatmap_intensity, OverlayRenderer, RenderedOverlay,
    DEFAULT_ALPHA,
};
