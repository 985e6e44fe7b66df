//! Gradient-weighted class activation mapping.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use dfd_core::{argmax, softmax, FeatureStage, ImportanceMap};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::SingleInputClassifier;
use crate::capture::{CaptureScope, Captures};
use crate::error::{AttributionError, Result};

/// Combine captured activations and gradients into a raw class activation map.
///
/// # Arguments
///
/// * `activations` - Layer output (batch, channels, h, w)
/// * `gradients` - Gradient of the class score w.r.t. that output (batch, channels, h, w)
///
/// # Returns
///
/// Non-negative map of shape (batch, 1, h, w).
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Tensor<B, 4> {
    // Spatial mean of the gradients: (batch, channels, h, w) -> (batch, channels, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    let cam = (activations * weights).sum_dim(1);

    // ReLU
    cam.clamp_min(0.0)
}

/// Bilinear upsampling of a (batch, 1, h, w) map to `[height, width]`.
pub fn upsample<B: Backend>(cam: Tensor<B, 4>, height: usize, width: usize) -> Tensor<B, 4> {
    let [_, _, h, w] = cam.dims();
    if h == height && w == width {
        return cam;
    }
    interpolate(
        cam,
        [height, width],
        InterpolateOptions::new(InterpolateMode::Bilinear),
    )
}

/// Result of one attribution call.
#[derive(Debug, Clone)]
pub struct ClassActivation {
    /// Rescaled map at the input resolution.
    pub map: ImportanceMap,
    /// The class the map explains.
    pub class_id: usize,
    /// Softmax probabilities of the attributed forward pass.
    pub probabilities: Vec<f32>,
}

/// Grad-CAM attribution engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradCam {
    /// The layer whose activations are weighted.
    pub layer: FeatureStage,
}

impl GradCam {
    /// Engine observing `layer`.
    pub fn new(layer: FeatureStage) -> Self {
        Self { layer }
    }

    /// Compute the importance map of `target` (the arg-max class when `None`).
    ///
    /// Capture state is created for this call only and released before it
    /// returns, on success and on error.
    ///
    /// # Arguments
    ///
    /// * `model` - Single-input classifier, usually a
    ///   [`MultiInputAdapter`](crate::MultiInputAdapter)
    /// * `image` - Input image (1, 3, h, w)
    /// * `target` - Class to explain
    pub fn explain<B, M>(
        &self,
        model: &M,
        image: Tensor<B, 4>,
        target: Option<usize>,
    ) -> Result<ClassActivation>
    where
        B: AutodiffBackend,
        M: SingleInputClassifier<B>,
    {
        let [_, _, height, width] = image.dims();
        let mut scope = CaptureScope::<B>::open(self.layer);

        let logits = model.classify_tapped(image, &mut |stage, features| {
            scope.tap(stage, features)
        });
        let [_, num_classes] = logits.dims();

        let row = to_host(logits.clone().slice([0..1, 0..num_classes]))?;
        let probabilities = softmax(&row);
        let class_id = target.unwrap_or_else(|| argmax(&probabilities));
        if class_id >= num_classes {
            return Err(AttributionError::InvalidTarget {
                class: class_id,
                num_classes,
            });
        }

        let score = logits.slice([0..1, class_id..class_id + 1]).sum();
        let grads = score.backward();
        scope.collect(&grads);

        let Captures {
            activation,
            gradient,
        } = scope.into_captures()?;
        debug!(
            layer = ?self.layer,
            class_id,
            dims = ?activation.dims(),
            "captured activation and gradient"
        );

        let cam = upsample(grad_cam(activation, gradient), height, width);
        let raw = to_host(cam.slice([0..1, 0..1, 0..height, 0..width]))?;
        let raw = Array2::from_shape_vec((height, width), raw)
            .map_err(|e| AttributionError::Data(e.to_string()))?;

        Ok(ClassActivation {
            map: ImportanceMap::rescale(raw),
            class_id,
            probabilities,
        })
    }
}

fn to_host<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| AttributionError::Data(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MultiInputAdapter;
    use burn::nn::{Linear, LinearConfig};
    use dfd_core::backend::{NdArray, NdArrayAutodiff};
    use dfd_core::{ForgeryClassifier, ModelInputs, Seed};
    use dfd_models::{ForgeryNet, ForgeryNetConfig};

    type TestBackend = NdArrayAutodiff;

    fn small_config() -> ForgeryNetConfig {
        ForgeryNetConfig::new(32)
            .with_backbone_channels(vec![8, 16])
            .with_hidden_dims([32, 16])
            .with_max_tokens(8)
    }

    fn setup(seed: u64) -> (ForgeryNet<TestBackend>, ModelInputs<TestBackend>) {
        let device = Default::default();
        Seed::new(seed).seed_backend::<TestBackend>();
        let model = small_config().init::<TestBackend>(&device);
        let inputs = ModelInputs::<TestBackend>::zeros(32, 8, &device);
        let image = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        (model, ModelInputs { image, ..inputs })
    }

    /// Taps the image but routes the logits around the tap result.
    #[derive(Module, Debug)]
    struct DetachedLayer<B: Backend> {
        head: Linear<B>,
    }

    impl<B: Backend> ForgeryClassifier<B> for DetachedLayer<B> {
        fn forward_tapped(
            &self,
            image: Tensor<B, 4>,
            _edge: Tensor<B, 4>,
            _tokens: Tensor<B, 2, Int>,
            tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
        ) -> Tensor<B, 2> {
            let _ignored = tap(FeatureStage::Backbone, image.clone());
            let [batch, channels, _, _] = image.dims();
            let pooled = image.mean_dim(3).mean_dim(2).reshape([batch, channels]);
            self.head.forward(pooled)
        }
    }

    #[test]
    fn test_grad_cam_weights_by_mean_gradient() {
        let device = Default::default();
        // Channel 0 all ones, channel 1 all twos.
        let act = Tensor::<NdArray, 4>::cat(
            vec![
                Tensor::ones([1, 1, 2, 2], &device),
                Tensor::ones([1, 1, 2, 2], &device) * 2.0,
            ],
            1,
        );
        let grad = Tensor::<NdArray, 4>::cat(
            vec![
                Tensor::ones([1, 1, 2, 2], &device) * 0.5,
                Tensor::ones([1, 1, 2, 2], &device) * 0.25,
            ],
            1,
        );

        let cam = grad_cam(act.clone(), grad.clone());
        assert_eq!(cam.dims(), [1, 1, 2, 2]);
        let values: Vec<f32> = cam.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        // Negative contributions are clipped.
        let cam = grad_cam(act, grad.neg());
        let values: Vec<f32> = cam.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_upsample_to_input_size() {
        let device = Default::default();
        let cam = Tensor::<NdArray, 4>::ones([1, 1, 4, 4], &device);
        assert_eq!(upsample(cam, 32, 24).dims(), [1, 1, 32, 24]);
    }

    #[test]
    fn test_explain_default_target_is_argmax() {
        let (model, inputs) = setup(3);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);

        let result = GradCam::default().explain(&adapter, image, None).unwrap();

        assert_eq!(result.map.shape(), [32, 32]);
        assert!(result.map.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(result.probabilities.len(), 7);
        let sum: f32 = result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(result.class_id, argmax(&result.probabilities));
    }

    #[test]
    fn test_explain_attention_layer() {
        let (model, inputs) = setup(4);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);

        let result = GradCam::new(FeatureStage::Attention)
            .explain(&adapter, image, Some(2))
            .unwrap();
        assert_eq!(result.class_id, 2);
        assert_eq!(result.map.shape(), [32, 32]);
    }

    #[test]
    fn test_explain_is_fresh_per_call() {
        let (model, inputs) = setup(5);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);
        let engine = GradCam::default();

        let first = engine.explain(&adapter, image.clone(), Some(0)).unwrap();
        let _other = engine.explain(&adapter, image.clone(), Some(6)).unwrap();
        let again = engine.explain(&adapter, image, Some(0)).unwrap();

        let diff = (first.map.values() - again.map.values())
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_explain_invalid_target() {
        let (model, inputs) = setup(6);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);

        let err = GradCam::default()
            .explain(&adapter, image, Some(7))
            .unwrap_err();
        assert!(matches!(
            err,
            AttributionError::InvalidTarget {
                class: 7,
                num_classes: 7
            }
        ));
    }

    #[test]
    fn test_explain_detached_layer_fails() {
        let device = Default::default();
        let model = DetachedLayer::<TestBackend> {
            head: LinearConfig::new(3, 7).init(&device),
        };
        let inputs = ModelInputs::<TestBackend>::zeros(16, 4, &device);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);

        let err = GradCam::default()
            .explain(&adapter, image, None)
            .unwrap_err();
        assert!(matches!(
            err,
            AttributionError::MissingGradient {
                layer: FeatureStage::Backbone
            }
        ));
    }

    #[test]
    fn test_explain_unreached_layer_fails() {
        let device = Default::default();
        let model = DetachedLayer::<TestBackend> {
            head: LinearConfig::new(3, 7).init(&device),
        };
        let inputs = ModelInputs::<TestBackend>::zeros(16, 4, &device);
        let (adapter, image) = MultiInputAdapter::split(&model, inputs);

        let err = GradCam::new(FeatureStage::Attention)
            .explain(&adapter, image, None)
            .unwrap_err();
        assert!(matches!(err, AttributionError::MissingActivation { .. }));
    }

    #[test]
    fn test_grad_cam_serde() {
        let engine: GradCam = serde_json::from_str(r#"{"layer":"attention"}"#).unwrap();
        assert_eq!(engine.layer, FeatureStage::Attention);
        assert_eq!(GradCam::default().layer, FeatureStage::Backbone);
    }
}
