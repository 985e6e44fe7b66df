//! Request-scoped activation and gradient capture.
//!
//! A [`CaptureScope`] lives for exactly one attribution call. It is opened
//! for one [`FeatureStage`], observes that stage during the forward pass,
//! collects the stage's gradient after `backward()`, and is consumed when
//! its captures are read. Nothing is ever attached to the model itself, so
//! concurrent requests sharing one set of weights cannot see each other's
//! captures.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use dfd_core::FeatureStage;
use tracing::trace;

use crate::error::{AttributionError, Result};

/// Activation and gradient of one layer, on the inner (non-autodiff) backend.
#[derive(Debug, Clone)]
pub struct Captures<B: Backend> {
    /// Layer output recorded on the forward pass, `(batch, channels, h, w)`.
    pub activation: Tensor<B, 4>,
    /// Gradient of the target score with respect to that output.
    pub gradient: Tensor<B, 4>,
}

/// Capture state for a single attribution call.
#[derive(Debug)]
pub struct CaptureScope<B: AutodiffBackend> {
    layer: FeatureStage,
    activation: Option<Tensor<B, 4>>,
    gradient: Option<Tensor<B::InnerBackend, 4>>,
}

impl<B: AutodiffBackend> CaptureScope<B> {
    /// Open an empty scope observing `layer`.
    pub fn open(layer: FeatureStage) -> Self {
        trace!(?layer, "opening capture scope");
        Self {
            layer,
            activation: None,
            gradient: None,
        }
    }

    /// Whether the forward pass reached the observed layer.
    pub fn has_activation(&self) -> bool {
        self.activation.is_some()
    }

    /// Tap callback for [`ForgeryClassifier::forward_tapped`].
    ///
    /// For the observed stage, the output is replaced by a gradient-requiring
    /// leaf holding the same values; the leaf is recorded so its gradient can
    /// be read after `backward()`. Other stages pass through untouched.
    ///
    /// [`ForgeryClassifier::forward_tapped`]: dfd_core::ForgeryClassifier::forward_tapped
    pub fn tap(&mut self, stage: FeatureStage, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if stage != self.layer {
            return output;
        }
        let leaf = output.detach().require_grad();
        trace!(?stage, dims = ?leaf.dims(), "captured activation");
        self.activation = Some(leaf.clone());
        leaf
    }

    /// Read the observed layer's gradient out of a backward pass.
    pub fn collect(&mut self, grads: &B::Gradients) {
        self.gradient = self.activation.as_ref().and_then(|leaf| leaf.grad(grads));
        trace!(
            layer = ?self.layer,
            found = self.gradient.is_some(),
            "collected gradient"
        );
    }

    /// Consume the scope and return both captures.
    ///
    /// # Errors
    ///
    /// [`AttributionError::MissingActivation`] if the forward pass never
    /// reached the layer, [`AttributionError::MissingGradient`] if the layer
    /// is not on the path to the back-propagated score.
    pub fn into_captures(mut self) -> Result<Captures<B::InnerBackend>> {
        let layer = self.layer;
        let activation = self
            .activation
            .take()
            .ok_or(AttributionError::MissingActivation { layer })?;
        let gradient = self
            .gradient
            .take()
            .ok_or(AttributionError::MissingGradient { layer })?;

        let activation = activation.inner();
        if activation.dims() != gradient.dims() {
            return Err(AttributionError::ShapeMismatch {
                activation: activation.dims().to_vec(),
                gradient: gradient.dims().to_vec(),
            });
        }
        Ok(Captures {
            activation,
            gradient,
        })
    }
}

impl<B: AutodiffBackend> Drop for CaptureScope<B> {
    fn drop(&mut self) {
        trace!(
            layer = ?self.layer,
            activation = self.activation.is_some(),
            gradient = self.gradient.is_some(),
            "releasing capture scope"
        );
        self.activation = None;
        self.gradient = None;
    }
}
