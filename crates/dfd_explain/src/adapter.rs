//! Single-input view of a three-input classifier.

use burn::prelude::*;
use dfd_core::{FeatureStage, ForgeryClassifier, ModelInputs};

/// A classifier with a single image input.
///
/// Attribution is defined over this interface so it never needs to know
/// about auxiliary inputs.
pub trait SingleInputClassifier<B: Backend> {
    /// Forward pass routing each [`FeatureStage`] output through `tap`.
    fn classify_tapped(
        &self,
        image: Tensor<B, 4>,
        tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
    ) -> Tensor<B, 2>;

    /// Plain forward pass returning logits.
    fn classify(&self, image: Tensor<B, 4>) -> Tensor<B, 2> {
        self.classify_tapped(image, &mut |_, features| features)
    }
}

/// Binds one request's edge and token tensors to a [`ForgeryClassifier`].
///
/// Built only through [`MultiInputAdapter::split`], which consumes the
/// request's [`ModelInputs`]; the bound tensors cannot be replaced, so an
/// adapter always attributes against the auxiliary inputs of the request it
/// was created for.
#[derive(Debug)]
pub struct MultiInputAdapter<'m, B: Backend, M> {
    model: &'m M,
    edge: Tensor<B, 4>,
    tokens: Tensor<B, 2, Int>,
}

impl<'m, B: Backend, M: ForgeryClassifier<B>> MultiInputAdapter<'m, B, M> {
    /// Split a request's inputs into an adapter and the free image tensor.
    pub fn split(model: &'m M, inputs: ModelInputs<B>) -> (Self, Tensor<B, 4>) {
        let ModelInputs {
            image,
            edge,
            tokens,
        } = inputs;
        (
            Self {
                model,
                edge,
                tokens,
            },
            image,
        )
    }

    /// Bound edge tensor.
    pub fn edge(&self) -> &Tensor<B, 4> {
        &self.edge
    }

    /// Bound token tensor.
    pub fn tokens(&self) -> &Tensor<B, 2, Int> {
        &self.tokens
    }
}

impl<B: Backend, M: ForgeryClassifier<B>> SingleInputClassifier<B> for MultiInputAdapter<'_, B, M> {
    fn classify_tapped(
        &self,
        image: Tensor<B, 4>,
        tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.model
            .forward_tapped(image, self.edge.clone(), self.tokens.clone(), tap)
    }
}
