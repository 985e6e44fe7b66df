//! Model checkpointing with architecture validation.
//!
//! Weights are stored with burn's named MessagePack recorder (`*.mpk`) next
//! to a JSON sidecar (`*.json`) recording the architecture they were trained
//! for. Loading refuses any checkpoint whose sidecar, parameter count or
//! probe output disagrees with the runtime configuration, so a mismatch
//! surfaces once at startup instead of on every request.
//!
//! # Example
//!
//! ```rust,ignore
//! use dfd_models::checkpoint::{load_forgery_net, save_forgery_net};
//!
//! save_forgery_net(&model, &config, "models/forgery_net")?;
//! let model = load_forgery_net::<NdArray>(&config, "models/forgery_net", &device)?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use dfd_core::{ForgeryClassifier, ModelInputs};
use serde::Serialize;
use tracing::{debug, info};

use crate::forgery_net::{ForgeryNet, ForgeryNetConfig};

/// Architecture name written to and expected in sidecars.
pub const FORGERY_NET_ARCH: &str = "ForgeryNet";

/// Path of the weights file for a checkpoint stem.
pub fn record_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("mpk")
}

/// Path of the metadata sidecar for a checkpoint stem.
pub fn metadata_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("json")
}

/// Model checkpoint metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration as JSON.
    pub config_json: String,
    /// Additional metadata.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a model.
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            config_json: String::new(),
            extra: HashMap::new(),
        }
    }

    /// Set the config JSON.
    pub fn with_config<C: Serialize>(mut self, config: &C) -> Result<Self> {
        self.config_json =
            serde_json::to_string(config).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(self)
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Decode the stored ForgeryNet configuration.
    pub fn forgery_net_config(&self) -> Result<ForgeryNetConfig> {
        serde_json::from_str(&self.config_json)
            .map_err(|e| CheckpointError::InvalidFormat(format!("config_json: {}", e)))
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CheckpointError::MissingMetadata(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::InvalidFormat(e.to_string()))
    }
}

/// Save a ForgeryNet and its metadata sidecar.
pub fn save_forgery_net<B: Backend>(
    model: &ForgeryNet<B>,
    config: &ForgeryNetConfig,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(record_path(path), &recorder)
        .map_err(|e| CheckpointError::Save(e.to_string()))?;

    CheckpointMetadata::new(FORGERY_NET_ARCH)
        .with_config(config)?
        .with_extra("num_params", model.num_params().to_string())
        .save(metadata_path(path))?;

    info!(path = %record_path(path).display(), "saved ForgeryNet checkpoint");
    Ok(())
}

/// Load a ForgeryNet, failing fast on any architecture mismatch.
pub fn load_forgery_net<B: Backend>(
    config: &ForgeryNetConfig,
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<ForgeryNet<B>> {
    let path = path.as_ref();
    config
        .validate()
        .map_err(|e| CheckpointError::ArchitectureMismatch(e.to_string()))?;

    let metadata = CheckpointMetadata::load(metadata_path(path))?;
    if metadata.arch != FORGERY_NET_ARCH {
        return Err(CheckpointError::ArchitectureMismatch(format!(
            "checkpoint arch {:?}, expected {:?}",
            metadata.arch, FORGERY_NET_ARCH
        )));
    }
    let stored = metadata.forgery_net_config()?;
    if &stored != config {
        return Err(CheckpointError::ArchitectureMismatch(format!(
            "checkpoint config {:?} differs from runtime config {:?}",
            stored, config
        )));
    }

    let fresh = config.init::<B>(device);
    let expected_params = fresh.num_params();

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let model = fresh
        .load_file(record_path(path), &recorder, device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    debug!(params = model.num_params(), "weights loaded");

    if model.num_params() != expected_params {
        return Err(CheckpointError::ArchitectureMismatch(format!(
            "checkpoint has {} parameters, architecture needs {}",
            model.num_params(),
            expected_params
        )));
    }

    let probe = ModelInputs::<B>::zeros(config.img_size, config.max_tokens, device);
    let logits = model.forward(probe.image, probe.edge, probe.tokens);
    if logits.dims() != [1, config.num_classes] {
        return Err(CheckpointError::ArchitectureMismatch(format!(
            "probe logits shape {:?}, expected [1, {}]",
            logits.dims(),
            config.num_classes
        )));
    }

    info!(
        path = %record_path(path).display(),
        params = expected_params,
        classes = config.num_classes,
        "loaded ForgeryNet checkpoint"
    );
    Ok(model)
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Metadata sidecar missing or unreadable.
    #[error("Missing checkpoint metadata: {0}")]
    MissingMetadata(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),

    /// Checkpoint does not match the runtime architecture.
    #[error("Checkpoint does not match architecture: {0}")]
    ArchitectureMismatch(String),
}
