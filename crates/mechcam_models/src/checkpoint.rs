//! Model checkpointing and serialization utilities.
//!
//! A checkpoint is a directory holding the weights as a named MessagePack
//! record (`model.mpk`) next to a JSON sidecar (`config.json`) describing
//! the architecture and the class labels.
//!
//! # Example
//!
//! ```rust,ignore
//! use mechcam_models::checkpoint::{load_classifier, save_checkpoint};
//! use mechcam_models::ResNetConfig;
//!
//! let config = ResNetConfig::resnet50(4);
//! let model = config.init::<NdArray>(&device);
//! save_checkpoint(&model, &config, &ClassLabels::default(), "runs/demo")?;
//!
//! let (model, metadata) = load_classifier::<NdArray>("runs/demo", &config, &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use mechcam_core::{CamError, ClassLabels};
use serde::{Deserialize, Serialize};

use crate::resnet::{record_mismatch, ResNet, ResNetConfig};

/// File stem of the weights record inside a checkpoint directory.
pub const WEIGHTS_STEM: &str = "model";

/// Extension the recorder appends to [`WEIGHTS_STEM`].
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// Name of the metadata sidecar inside a checkpoint directory.
pub const METADATA_FILE: &str = "config.json";

/// Paths of the files making up a checkpoint directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    dir: PathBuf,
}

impl CheckpointPaths {
    /// Checkpoint rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the recorder (without extension).
    pub fn record_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_STEM)
    }

    /// Path of the weights file on disk.
    pub fn weights(&self) -> PathBuf {
        self.record_path().with_extension(WEIGHTS_EXTENSION)
    }

    /// Path of the metadata sidecar.
    pub fn metadata(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }
}

/// Save a model's weights with the named MessagePack recorder.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.as_ref().to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))
}

/// Load a model record saved by [`save_model`].
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .load(path.as_ref().to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Checkpoint metadata sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration as JSON.
    pub config_json: String,
    /// Class names, index-aligned with the model outputs.
    pub class_names: Option<ClassLabels>,
}

impl CheckpointMetadata {
    /// Create new metadata for a model.
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            config_json: String::new(),
            class_names: None,
        }
    }

    /// Set the config JSON.
    #[must_use]
    pub fn with_config<C: Serialize>(mut self, config: &C) -> Self {
        self.config_json = serde_json::to_string(config).unwrap_or_default();
        self
    }

    /// Set the class names.
    #[must_use]
    pub fn with_class_names(mut self, labels: ClassLabels) -> Self {
        self.class_names = Some(labels);
        self
    }

    /// Parse the stored ResNet configuration.
    pub fn resnet_config(&self) -> Result<ResNetConfig> {
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
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::InvalidFormat(e.to_string()))
    }
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

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),
}

/// Write a ResNet checkpoint directory (weights and metadata).
pub fn save_checkpoint<B: Backend>(
    model: &ResNet<B>,
    config: &ResNetConfig,
    labels: &ClassLabels,
    dir: impl AsRef<Path>,
) -> Result<CheckpointPaths> {
    let paths = CheckpointPaths::new(dir);
    std::fs::create_dir_all(paths.dir()).map_err(|e| CheckpointError::Save(e.to_string()))?;

    save_model::<B, _>(model, paths.record_path())?;
    CheckpointMetadata::new("ResNet")
        .with_config(config)
        .with_class_names(labels.clone())
        .save(paths.metadata())?;

    tracing::info!("Checkpoint saved to {:?}", paths.dir());
    Ok(paths)
}

/// Load a ResNet classifier from a checkpoint directory.
///
/// The architecture comes from the metadata sidecar when present, otherwise
/// from `fallback`. A missing weights file, an unreadable record, or a record
/// whose block layout or parameter count does not match the architecture all
/// yield [`CamError::ModelUnavailable`].
pub fn load_classifier<B: Backend>(
    dir: impl AsRef<Path>,
    fallback: &ResNetConfig,
    device: &B::Device,
) -> mechcam_core::Result<(ResNet<B>, CheckpointMetadata)> {
    let paths = CheckpointPaths::new(dir);
    let unavailable = |reason: String| CamError::ModelUnavailable {
        path: paths.dir().to_path_buf(),
        reason,
    };

    if !paths.weights().is_file() {
        return Err(unavailable(format!(
            "weights file {:?} not found",
            paths.weights()
        )));
    }

    let metadata = if paths.metadata().is_file() {
        CheckpointMetadata::load(paths.metadata()).map_err(|e| unavailable(e.to_string()))?
    } else {
        tracing::debug!("No metadata at {:?}, using fallback config", paths.metadata());
        CheckpointMetadata::new("ResNet").with_config(fallback)
    };
    let config = metadata
        .resnet_config()
        .map_err(|e| unavailable(e.to_string()))?;

    let model = config.init::<B>(device);
    let expected_params = model.num_params();
    let record = load_record::<B, ResNet<B>>(paths.record_path(), device)
        .map_err(|e| unavailable(e.to_string()))?;
    if let Some(reason) = record_mismatch(&config, &record) {
        return Err(unavailable(format!("incompatible checkpoint: {}", reason)));
    }
    let model = model.load_record(record);

    let loaded_params = model.num_params();
    if loaded_params != expected_params {
        return Err(unavailable(format!(
            "incompatible parameters: architecture has {} values, checkpoint has {}",
            expected_params, loaded_params
        )));
    }

    tracing::info!(
        "Loaded {} checkpoint from {:?} ({} parameters, {} classes)",
        metadata.arch,
        paths.dir(),
        loaded_params,
        config.n_classes
    );
    Ok((model, metadata))
}
