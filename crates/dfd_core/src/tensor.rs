//! Classifier input tensors.

use burn::prelude::*;
use burn::tensor::TensorData;
use ndarray::{Array1, Array2, Array3};

use crate::error::{CoreError, Result};

/// Host-side classifier inputs for one image.
///
/// Produced once per request by preprocessing and never mutated; the same
/// values feed both the classification pass and the attribution pass, each
/// of which materializes its own tensors with [`ModelInputs::from_prepared`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    /// Normalized color image, `(3, size, size)`.
    pub image: Array3<f32>,
    /// Edge map in `[0, 1]`, `(size, size)`.
    pub edge: Array2<f32>,
    /// Token ids, `(max_tokens,)`.
    pub tokens: Array1<i64>,
}

impl PreparedInput {
    /// Bundle prepared arrays, checking that they agree on spatial size.
    ///
    /// # Errors
    ///
    /// Returns an error if the color image is not 3-channel and square, or if
    /// the edge map's size differs from it.
    pub fn new(image: Array3<f32>, edge: Array2<f32>, tokens: Array1<i64>) -> Result<Self> {
        let (c, h, w) = image.dim();
        if c != 3 || h != w {
            return Err(CoreError::InvalidShape {
                expected: "(3, size, size)".to_string(),
                got: format!("({}, {}, {})", c, h, w),
            });
        }
        if edge.dim() != (h, w) {
            return Err(CoreError::InvalidShape {
                expected: format!("({}, {})", h, w),
                got: format!("{:?}", edge.dim()),
            });
        }
        Ok(Self {
            image,
            edge,
            tokens,
        })
    }

    /// Spatial size of the square inputs.
    #[must_use]
    pub fn size(&self) -> usize {
        self.image.dim().1
    }

    /// Length of the token sequence.
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.tokens.len()
    }
}

/// Batched device tensors for one classifier call.
#[derive(Debug, Clone)]
pub struct ModelInputs<B: Backend> {
    /// Normalized color image, `(1, 3, size, size)`.
    pub image: Tensor<B, 4>,
    /// Edge map, `(1, 1, size, size)`.
    pub edge: Tensor<B, 4>,
    /// Token ids, `(1, max_tokens)`.
    pub tokens: Tensor<B, 2, Int>,
}

impl<B: Backend> ModelInputs<B> {
    /// Materialize prepared arrays on `device` with a batch dimension of 1.
    pub fn from_prepared(prepared: &PreparedInput, device: &B::Device) -> Self {
        let size = prepared.size();
        let max_tokens = prepared.max_tokens();

        let image: Vec<f32> = prepared.image.iter().copied().collect();
        let edge: Vec<f32> = prepared.edge.iter().copied().collect();
        let tokens: Vec<i64> = prepared.tokens.iter().copied().collect();

        Self {
            image: Tensor::from_data(TensorData::new(image, [1, 3, size, size]), device),
            edge: Tensor::from_data(TensorData::new(edge, [1, 1, size, size]), device),
            tokens: Tensor::from_data(TensorData::new(tokens, [1, max_tokens]), device),
        }
    }

    /// All-zero inputs, used to probe a freshly loaded network.
    pub fn zeros(size: usize, max_tokens: usize, device: &B::Device) -> Self {
        Self {
            image: Tensor::zeros([1, 3, size, size], device),
            edge: Tensor::zeros([1, 1, size, size], device),
            tokens: Tensor::zeros([1, max_tokens], device),
        }
    }

    /// Spatial size of the image tensor.
    pub fn size(&self) -> usize {
        self.image.dims()[2]
    }
}
