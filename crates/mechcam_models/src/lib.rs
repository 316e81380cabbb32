//! # mechcam_models
//!
//! Image classifiers for mechcam.
//!
//! This crate provides:
//! - [`ResNet`] - bottleneck ResNet with observable stages (`stem`, `layer1`..`layer4`)
//! - [`FrozenBatchNorm`] - inference-mode normalization usable under autodiff
//! - [`LayerObserver`] - explicit observation points invoked during the forward pass
//! - [`CamClassifier`] - the classifier contract consumed by the explainer
//! - [`checkpoint`] - weights + metadata persistence

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod norm;
mod observer;
mod resnet;
mod traits;

pub use checkpoint::{
    load_classifier, save_checkpoint, CheckpointError, CheckpointMetadata, CheckpointPaths,
};
pub use norm::FrozenBatchNorm;
pub use observer::{LayerObserver, Passthrough, ShapeRecorder};
pub use resnet::{
    Bottleneck, Downsample, ResNet, ResNetConfig, Stem, BOTTLENECK_EXPANSION, RESNET_STAGES,
};
pub use traits::CamClassifier;
