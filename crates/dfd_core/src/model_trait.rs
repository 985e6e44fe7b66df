//! Classifier traits.
//!
//! Defines the three-input forward contract every forgery classifier
//! implements, and the named points inside it that attribution can observe.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// A named intermediate feature grid inside a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStage {
    /// Output of the last backbone stage, before attention.
    #[default]
    Backbone,
    /// Output of the channel+spatial attention block, before pooling.
    Attention,
}

/// Whether regularizers that only make sense while fitting are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// Deterministic forward: dropout disabled.
    #[default]
    Inference,
    /// Dropout enabled.
    Training,
}

/// Trait for document forgery classifiers.
///
/// A classifier always returns exactly one logits tensor of shape
/// `(batch, n_classes)`; any auxiliary output belongs on a separate method.
pub trait ForgeryClassifier<B: Backend> {
    /// Inference forward pass that routes every [`FeatureStage`] output
    /// through `tap` and continues with whatever `tap` returns.
    ///
    /// # Arguments
    ///
    /// * `image` - Normalized color tensor of shape (batch, 3, size, size)
    /// * `edge` - Edge map of shape (batch, 1, size, size)
    /// * `tokens` - Token ids of shape (batch, max_tokens)
    /// * `tap` - Observer for intermediate feature grids
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes)
    fn forward_tapped(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
        tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
    ) -> Tensor<B, 2>;

    /// Inference forward pass returning logits.
    fn forward(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        self.forward_tapped(image, edge, tokens, &mut |_, features| features)
    }

    /// Inference forward pass returning probabilities.
    fn forward_probs(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let logits = self.forward(image, edge, tokens);
        burn::tensor::activation::softmax(logits, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_stage_serde() {
        let json = serde_json::to_string(&FeatureStage::Attention).unwrap();
        assert_eq!(json, "\"attention\"");
        let stage: FeatureStage = serde_json::from_str("\"backbone\"").unwrap();
        assert_eq!(stage, FeatureStage::Backbone);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FeatureStage::default(), FeatureStage::Backbone);
        assert_eq!(ForwardMode::default(), ForwardMode::Inference);
    }
}
