//! # dfd_explain
//!
//! Grad-CAM explanations for forgery classifiers.
//!
//! This crate provides:
//! - [`CaptureScope`]: activation/gradient capture scoped to one attribution call
//! - [`MultiInputAdapter`]: single-input view over a three-input classifier
//! - [`GradCam`]: the attribution engine producing an [`ImportanceMap`](dfd_core::ImportanceMap)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod adapter;
mod attribution;
mod capture;
mod error;

pub use adapter::{MultiInputAdapter, SingleInputClassifier};
pub use attribution::{grad_cam, upsample, ClassActivation, GradCam};
pub use capture::{CaptureScope, Captures};
pub use error::{AttributionError, Result};
