//! # mechcam_explain
//!
//! Saliency explanations for mechcam classifiers.
//!
//! This crate provides:
//! - [`CaptureHooks`] - activation and gradient capture slots on one layer
//! - [`GradCam`] - the Grad-CAM explainer and its [`Explanation`]s
//! - [`Heatmap`] - normalized maps at input resolution
//! - [`overlay()`] - jet colour overlay of a heatmap on a frame

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod attribution;
mod capture;
mod gradcam;
mod heatmap;
mod overlay;

pub use attribution::{grad_cam, normalize_unit_interval, NORMALIZE_EPSILON};
pub use capture::{ActivationCapture, CaptureHooks, GradientCapture};
pub use gradcam::{argmax, Explanation, GradCam, GradCamConfig, Prediction};
pub use heatmap::{Heatmap, HeatmapData};
pub use overlay::{jet, overlay, OverlayConfig};
