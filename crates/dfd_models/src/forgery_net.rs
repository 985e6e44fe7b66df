//! ForgeryNet: attention-fusion classifier for document forgery.
//!
//! Three branches feed a shared head:
//! - image: backbone -> CBAM attention -> global average pool (C)
//! - edge map: strided conv stem -> global average pool (edge_channels)
//! - token ids: embedding -> mean -> projection (token_dim)
//!
//! The embeddings are concatenated and classified by a three-layer MLP.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use dfd_core::{FeatureStage, ForgeryClassifier, ForwardMode, NUM_CLASSES};
use serde::{Deserialize, Serialize};

use crate::attention::Cbam;
use crate::backbone::{feature_size, Backbone};
use crate::branches::{EdgeBranch, TokenBranch};

/// Rejected architecture configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid ForgeryNet config: {0}")]
pub struct InvalidConfig(pub String);

/// Configuration for ForgeryNet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeryNetConfig {
    /// Side length of the square input image.
    pub img_size: usize,
    /// Number of output classes.
    pub num_classes: usize,
    /// Output channels of each backbone stage; the last is the feature width C.
    pub backbone_channels: Vec<usize>,
    /// Channel attention bottleneck reduction factor.
    pub attention_reduction: usize,
    /// Spatial attention kernel size.
    pub spatial_kernel: usize,
    /// Edge branch embedding width.
    pub edge_channels: usize,
    /// Edge branch kernel size.
    pub edge_kernel: usize,
    /// Token vocabulary size.
    pub token_vocab_size: usize,
    /// Token embedding width.
    pub token_embed_dim: usize,
    /// Token branch embedding width.
    pub token_dim: usize,
    /// Fixed token sequence length.
    pub max_tokens: usize,
    /// Hidden widths of the fusion head.
    pub hidden_dims: [usize; 2],
    /// Dropout rate in the fusion head (training only).
    pub dropout: f64,
}

impl Default for ForgeryNetConfig {
    fn default() -> Self {
        Self {
            img_size: 256,
            num_classes: NUM_CLASSES,
            backbone_channels: vec![32, 64, 128, 256, 512],
            attention_reduction: 16,
            spatial_kernel: 7,
            edge_channels: 32,
            edge_kernel: 7,
            token_vocab_size: 128,
            token_embed_dim: 64,
            token_dim: 32,
            max_tokens: 64,
            hidden_dims: [256, 128],
            dropout: 0.2,
        }
    }
}

impl ForgeryNetConfig {
    /// Create a new config for the given input size.
    pub fn new(img_size: usize) -> Self {
        Self {
            img_size,
            ..Default::default()
        }
    }

    /// Set the backbone stage widths.
    #[must_use]
    pub fn with_backbone_channels(mut self, channels: Vec<usize>) -> Self {
        self.backbone_channels = channels;
        self
    }

    /// Set the fusion head hidden widths.
    #[must_use]
    pub fn with_hidden_dims(mut self, hidden_dims: [usize; 2]) -> Self {
        self.hidden_dims = hidden_dims;
        self
    }

    /// Set the token sequence length.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Feature width C produced by the backbone.
    pub fn feature_channels(&self) -> usize {
        self.backbone_channels.last().copied().unwrap_or(0)
    }

    /// Side length of the backbone feature grid.
    pub fn feature_size(&self) -> usize {
        feature_size(self.img_size, self.backbone_channels.len())
    }

    /// Width of the concatenated branch embeddings.
    pub fn fusion_dim(&self) -> usize {
        self.feature_channels() + self.edge_channels + self.token_dim
    }

    /// Check the configuration describes a buildable network.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.backbone_channels.is_empty() || self.backbone_channels.contains(&0) {
            return Err(InvalidConfig(format!(
                "backbone_channels must be non-empty and positive, got {:?}",
                self.backbone_channels
            )));
        }
        if self.img_size == 0 {
            return Err(InvalidConfig("img_size must be positive".to_string()));
        }
        if self.num_classes == 0 || self.max_tokens == 0 || self.token_vocab_size == 0 {
            return Err(InvalidConfig(
                "num_classes, max_tokens and token_vocab_size must be positive".to_string(),
            ));
        }
        if self.spatial_kernel % 2 == 0 || self.edge_kernel % 2 == 0 {
            return Err(InvalidConfig(format!(
                "kernel sizes must be odd, got spatial={} edge={}",
                self.spatial_kernel, self.edge_kernel
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ForgeryNet<B> {
        ForgeryNet::new(self.clone(), device)
    }
}

/// Fusion head: Linear -> ReLU -> Dropout -> Linear -> ReLU -> Linear
#[derive(Module, Debug)]
pub struct FusionHead<B: Backend> {
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
    out: Linear<B>,
}

impl<B: Backend> FusionHead<B> {
    /// Create the head.
    pub fn new(
        in_dim: usize,
        hidden_dims: [usize; 2],
        num_classes: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            fc1: LinearConfig::new(in_dim, hidden_dims[0]).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            fc2: LinearConfig::new(hidden_dims[0], hidden_dims[1]).init(device),
            out: LinearConfig::new(hidden_dims[1], num_classes).init(device),
        }
    }

    /// Map fused embeddings (batch, in_dim) to logits (batch, num_classes).
    pub fn forward(&self, fused: Tensor<B, 2>, mode: ForwardMode) -> Tensor<B, 2> {
        let relu = Relu::new();
        let x = relu.forward(self.fc1.forward(fused));
        let x = match mode {
            ForwardMode::Training => self.dropout.forward(x),
            ForwardMode::Inference => x,
        };
        let x = relu.forward(self.fc2.forward(x));
        self.out.forward(x)
    }
}

/// Attention-fusion document forgery classifier.
///
/// # Example
///
/// ```rust,ignore
/// use dfd_models::ForgeryNetConfig;
///
/// let model = ForgeryNetConfig::new(256).init::<NdArray>(&device);
/// let logits = model.forward(image, edge, tokens);
/// // logits shape: [1, 7]
/// ```
#[derive(Module, Debug)]
pub struct ForgeryNet<B: Backend> {
    /// Image feature extractor.
    backbone: Backbone<B>,
    /// Channel then spatial attention over the feature grid.
    attention: Cbam<B>,
    /// Edge-map embedding.
    edge_branch: EdgeBranch<B>,
    /// Token embedding.
    token_branch: TokenBranch<B>,
    /// Classifier over the fused embeddings.
    head: FusionHead<B>,
}

impl<B: Backend> ForgeryNet<B> {
    /// Create a new ForgeryNet.
    pub fn new(config: ForgeryNetConfig, device: &B::Device) -> Self {
        let channels = config.feature_channels();
        Self {
            backbone: Backbone::new(&config.backbone_channels, device),
            attention: Cbam::new(
                channels,
                config.attention_reduction,
                config.spatial_kernel,
                device,
            ),
            edge_branch: EdgeBranch::new(config.edge_channels, config.edge_kernel, device),
            token_branch: TokenBranch::new(
                config.token_vocab_size,
                config.token_embed_dim,
                config.token_dim,
                device,
            ),
            head: FusionHead::new(
                config.fusion_dim(),
                config.hidden_dims,
                config.num_classes,
                config.dropout,
                device,
            ),
        }
    }

    /// Forward pass with an explicit mode and feature tap.
    ///
    /// # Arguments
    ///
    /// * `image` - (batch, 3, size, size)
    /// * `edge` - (batch, 1, size, size)
    /// * `tokens` - (batch, max_tokens)
    /// * `mode` - Whether dropout is active
    /// * `tap` - Receives each [`FeatureStage`] output; its return value is used downstream
    ///
    /// # Returns
    ///
    /// Logits of shape (batch, num_classes)
    pub fn forward_with_mode(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
        mode: ForwardMode,
        tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let features = tap(FeatureStage::Backbone, self.backbone.forward(image));
        let attended = tap(FeatureStage::Attention, self.attention.forward(features));

        let [batch, channels, _, _] = attended.dims();
        let image_embedding = attended.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        let edge_embedding = self.edge_branch.forward(edge);
        let token_embedding = self.token_branch.forward(tokens);

        let fused = Tensor::cat(vec![image_embedding, edge_embedding, token_embedding], 1);
        self.head.forward(fused, mode)
    }

    /// Training-mode forward pass (dropout active on autodiff backends).
    pub fn forward_train(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        self.forward_with_mode(image, edge, tokens, ForwardMode::Training, &mut |_, t| t)
    }
}

impl<B: Backend> ForgeryClassifier<B> for ForgeryNet<B> {
    fn forward_tapped(
        &self,
        image: Tensor<B, 4>,
        edge: Tensor<B, 4>,
        tokens: Tensor<B, 2, Int>,
        tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.forward_with_mode(image, edge, tokens, ForwardMode::Inference, tap)
    }
}
