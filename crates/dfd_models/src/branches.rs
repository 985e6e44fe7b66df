//! Auxiliary input branches: edge map and token ids.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    Embedding, EmbeddingConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;

/// Edge-map stem: Conv2d(1, C, k, stride 2) -> ReLU -> global average pool
#[derive(Module, Debug)]
pub struct EdgeBranch<B: Backend> {
    /// Strided convolution over the single-channel edge map.
    conv: Conv2d<B>,
}

impl<B: Backend> EdgeBranch<B> {
    /// Create the edge branch.
    pub fn new(out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let padding = kernel_size / 2;
        let conv = Conv2dConfig::new([1, out_channels], [kernel_size, kernel_size])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .init(device);
        Self { conv }
    }

    /// Embed an edge map of shape (batch, 1, h, w) into (batch, out_channels).
    pub fn forward(&self, edge: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = Relu::new().forward(self.conv.forward(edge));
        let [batch, channels, _, _] = out.dims();
        out.mean_dim(3).mean_dim(2).reshape([batch, channels])
    }
}

/// Token branch: Embedding -> mean over sequence -> Linear
///
/// Id 0 is padding and embeds to the zero vector, so an all-padding sequence
/// always produces the projection bias regardless of the image.
#[derive(Module, Debug)]
pub struct TokenBranch<B: Backend> {
    /// Token embedding table.
    embedding: Embedding<B>,
    /// Projection to the fusion width.
    proj: Linear<B>,
}

impl<B: Backend> TokenBranch<B> {
    /// Create the token branch.
    pub fn new(vocab_size: usize, embed_dim: usize, out_dim: usize, device: &B::Device) -> Self {
        Self {
            embedding: EmbeddingConfig::new(vocab_size, embed_dim).init(device),
            proj: LinearConfig::new(embed_dim, out_dim).init(device),
        }
    }

    /// Embed token ids of shape (batch, seq_len) into (batch, out_dim).
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch, seq_len] = tokens.dims();
        let not_padding = tokens
            .clone()
            .not_equal_elem(0)
            .float()
            .reshape([batch, seq_len, 1]);

        let embedded = self.embedding.forward(tokens) * not_padding;
        let [_, _, embed_dim] = embedded.dims();
        let pooled = embedded.mean_dim(1).reshape([batch, embed_dim]);
        self.proj.forward(pooled)
    }
}
