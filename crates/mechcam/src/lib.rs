//! # mechcam
//!
//! Mechanical component classification with Grad-CAM explanations.
//!
//! - **Core**: frames, preprocessing, errors, labels ([`core`])
//! - **Models**: ResNet classifier and checkpoints ([`models`])
//! - **Explainability**: Grad-CAM, heatmaps, overlays ([`explain`])
//! - **Demo**: configuration and the select/classify/explain pipeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mechcam::prelude::*;
//!
//! let demo = Demo::load(DemoConfig::default())?;
//! if let Some((name, frame)) = demo.select_sample(None)? {
//!     let analysis = demo.analyze(&frame);
//!     match &analysis.prediction {
//!         Some(p) => println!("{name}: {}", p.label),
//!         None => println!("{}", analysis.message.unwrap_or_default()),
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod pipeline;

// Re-export all crates
pub use mechcam_core as core;
pub use mechcam_explain as explain;
pub use mechcam_models as models;

pub use config::DemoConfig;
pub use pipeline::{Analysis, AnalysisReport, ClassPrediction, Classifier, Demo, Samples};

/// Backend used for explanations: ndarray on the CPU with autodiff.
pub type CamBackend = mechcam_core::backend::CpuAutodiff;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use mechcam::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Analysis, CamBackend, Demo, DemoConfig};

    pub use mechcam_core::{
        CamError, ClassLabels, ImageShape, Preprocess, PreprocessConfig, Result, RgbFrame, Seed,
    };
    pub use mechcam_explain::{
        overlay, Explanation, GradCam, GradCamConfig, Heatmap, OverlayConfig,
    };
    pub use mechcam_models::{CamClassifier, ResNet, ResNetConfig};
}
