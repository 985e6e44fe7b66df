//! Convolutional feature extractor.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::silu;

/// A single downsampling stage: Conv2d(3x3, stride 2) -> SiLU
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    /// Strided convolution.
    conv: Conv2d<B>,
}

impl<B: Backend> ConvStage<B> {
    /// Create a stage mapping `in_channels` to `out_channels` at half resolution.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        Self { conv }
    }

    /// Forward pass through the stage.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        silu(self.conv.forward(x))
    }
}

/// Stack of downsampling stages producing the feature grid.
///
/// Architecture for `channels = [c1, .., cn]`:
/// - ConvStage(3, c1) -> ... -> ConvStage(c(n-1), cn)
///
/// Each stage halves height and width (rounding up).
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    /// Stages in application order.
    stages: Vec<ConvStage<B>>,
}

impl<B: Backend> Backbone<B> {
    /// Create a backbone for RGB input.
    pub fn new(channels: &[usize], device: &B::Device) -> Self {
        let mut in_channels = 3;
        let mut stages = Vec::with_capacity(channels.len());
        for &out_channels in channels {
            stages.push(ConvStage::new(in_channels, out_channels, device));
            in_channels = out_channels;
        }
        Self { stages }
    }

    /// Number of downsampling stages.
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Image tensor of shape (batch, 3, height, width)
    ///
    /// # Returns
    ///
    /// Feature grid of shape (batch, channels, height / 2^depth, width / 2^depth)
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stages
            .iter()
            .fold(x, |features, stage| stage.forward(features))
    }
}

/// Spatial size after `depth` stride-2 stages with padding 1.
#[must_use]
pub fn feature_size(input_size: usize, depth: usize) -> usize {
    (0..depth).fold(input_size, |size, _| size.div_ceil(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfd_core::backend::NdArray;

    #[test]
    fn test_backbone_output_shape() {
        let device = Default::default();
        let backbone = Backbone::<NdArray>::new(&[4, 8, 16], &device);
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 32, 32], &device);

        let out = backbone.forward(x);
        assert_eq!(backbone.depth(), 3);
        assert_eq!(out.dims(), [1, 16, 4, 4]);
    }

    #[test]
    fn test_feature_size() {
        assert_eq!(feature_size(256, 5), 8);
        assert_eq!(feature_size(300, 2), 75);
        assert_eq!(feature_size(33, 1), 17);
        assert_eq!(feature_size(10, 0), 10);
    }
}
