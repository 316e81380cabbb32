//! # mechcam_core
//!
//! Core types for the mechcam component classifier and its explanations.
//!
//! This crate provides:
//! - [`CamError`] covering model loading, input validation and explanation
//! - [`ImageShape`] for `(C, H, W)` model inputs
//! - [`RgbFrame`] decoded pixel buffers and their JSON file form
//! - [`Preprocess`] resize-and-normalize into Burn tensors
//! - [`bilinear_resize`] with half-pixel centre alignment
//! - [`ClassLabels`] and [`Seed`]
//!
//! ## Shape Convention
//!
//! Image tensors follow `(B, C, H, W)` with `B = 1`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod interpolate;
mod labels;
mod preprocess;
mod seed;
mod shape;

pub use error::{CamError, Result};
pub use frame::{FrameFile, RgbFrame};
pub use interpolate::bilinear_resize;
pub use labels::{ClassLabels, MECHANICAL_COMPONENTS};
pub use preprocess::{Preprocess, PreprocessConfig, IMAGENET_MEAN, IMAGENET_STD};
pub use seed::Seed;
pub use shape::ImageShape;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_autodiff::Autodiff;

    /// CPU backend with reverse-mode differentiation.
    #[cfg(feature = "backend-ndarray")]
    pub type CpuAutodiff = Autodiff<NdArray>;
}
