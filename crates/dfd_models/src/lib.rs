//! # dfd_models
//!
//! Networks for document forgery classification.
//!
//! - [`ForgeryNet`] - backbone + CBAM attention fused with edge and token branches
//! - [`Cbam`], [`ChannelAttention`], [`SpatialAttention`] - attention blocks
//! - [`checkpoint`] - save/load with architecture validation

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attention;
pub mod backbone;
pub mod branches;
pub mod checkpoint;
pub mod forgery_net;

pub use attention::{Cbam, ChannelAttention, SpatialAttention};
pub use backbone::{feature_size, Backbone, ConvStage};
pub use branches::{EdgeBranch, TokenBranch};
pub use checkpoint::{
    load_forgery_net, metadata_path, record_path, save_forgery_net, CheckpointError,
    CheckpointMetadata, FORGERY_NET_ARCH,
};
pub use forgery_net::{ForgeryNet, ForgeryNetConfig, FusionHead, InvalidConfig};
