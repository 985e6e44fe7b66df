//! Channel and spatial attention (CBAM).
//!
//! Based on "CBAM: Convolutional Block Attention Module" by Woo et al. (2018).
//! Channel attention reweights each feature map, then spatial attention
//! reweights each location of the channel-attended grid. The order is fixed.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

/// Squeeze-and-excitation style channel attention.
#[derive(Module, Debug)]
pub struct ChannelAttention<B: Backend> {
    /// Bottleneck projection, `C -> C / reduction`.
    reduce: Linear<B>,
    /// Expansion back to `C`.
    expand: Linear<B>,
}

impl<B: Backend> ChannelAttention<B> {
    /// Create channel attention for `channels` feature maps.
    ///
    /// The bottleneck width is `channels / reduction`, never less than one.
    pub fn new(channels: usize, reduction: usize, device: &B::Device) -> Self {
        let hidden = (channels / reduction.max(1)).max(1);
        Self {
            reduce: LinearConfig::new(channels, hidden).init(device),
            expand: LinearConfig::new(hidden, channels).init(device),
        }
    }

    /// Per-channel weights in `(0, 1)`, shape (batch, channels, 1, 1).
    pub fn weights(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, _, _] = x.dims();
        let pooled = x.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        let hidden = Relu::new().forward(self.reduce.forward(pooled));
        sigmoid(self.expand.forward(hidden)).reshape([batch, channels, 1, 1])
    }

    /// Rescale each channel of `x` by its weight.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let weights = self.weights(x.clone());
        x * weights
    }
}

/// Spatial attention over the channel-wise mean and max maps.
#[derive(Module, Debug)]
pub struct SpatialAttention<B: Backend> {
    /// `2 -> 1` convolution over the stacked mean/max maps.
    conv: Conv2d<B>,
}

impl<B: Backend> SpatialAttention<B> {
    /// Create spatial attention with a square `kernel_size` (odd).
    pub fn new(kernel_size: usize, device: &B::Device) -> Self {
        let padding = kernel_size / 2;
        let conv = Conv2dConfig::new([2, 1], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .init(device);
        Self { conv }
    }

    /// Per-location weights in `(0, 1)`, shape (batch, 1, height, width).
    pub fn weights(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let avg = x.clone().mean_dim(1);
        // Channel max taken over the last axis; ndarray only backpropagates
        // max_dim along the innermost dimension.
        let max = x.permute([0, 2, 3, 1]).max_dim(3).permute([0, 3, 1, 2]);
        let stacked = Tensor::cat(vec![avg, max], 1);
        sigmoid(self.conv.forward(stacked))
    }

    /// Rescale every location of `x` by its weight.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let weights = self.weights(x.clone());
        x * weights
    }
}

/// Channel attention followed by spatial attention.
#[derive(Module, Debug)]
pub struct Cbam<B: Backend> {
    /// Applied first.
    pub channel: ChannelAttention<B>,
    /// Applied to the channel-attended grid.
    pub spatial: SpatialAttention<B>,
}

impl<B: Backend> Cbam<B> {
    /// Create a CBAM block.
    pub fn new(channels: usize, reduction: usize, kernel_size: usize, device: &B::Device) -> Self {
        Self {
            channel: ChannelAttention::new(channels, reduction, device),
            spatial: SpatialAttention::new(kernel_size, device),
        }
    }

    /// Forward pass, shape preserving.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.channel.forward(x);
        self.spatial.forward(x)
    }
}
