//! Grad-CAM explainer bound to one classifier layer.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use mechcam_core::{bilinear_resize, CamError, Result};
use mechcam_models::CamClassifier;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::attribution::{grad_cam, normalize_unit_interval, NORMALIZE_EPSILON};
use crate::capture::CaptureHooks;
use crate::heatmap::Heatmap;

/// Configuration for [`GradCam`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradCamConfig {
    /// Observable layer whose activations are explained.
    pub target_layer: String,
    /// Added to the min-max range when normalizing.
    pub epsilon: f32,
}

impl Default for GradCamConfig {
    fn default() -> Self {
        Self {
            target_layer: "layer4".to_string(),
            epsilon: NORMALIZE_EPSILON,
        }
    }
}

impl GradCamConfig {
    /// Config targeting `layer`.
    pub fn new(target_layer: impl Into<String>) -> Self {
        Self {
            target_layer: target_layer.into(),
            ..Default::default()
        }
    }

    /// Set the normalization epsilon.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Class scores of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the highest score.
    pub class_index: usize,
    /// Raw class scores (logits).
    pub scores: Vec<f32>,
}

/// Result of [`GradCam::explain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Normalized map at input resolution.
    pub heatmap: Heatmap,
    /// Class the map explains.
    pub class_index: usize,
    /// Raw class scores from the forward pass.
    pub scores: Vec<f32>,
    /// `(height, width)` of the target layer's activations.
    pub feature_size: (usize, usize),
}

/// Index of the largest score; the lowest index wins ties.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}

/// [`argmax`] of `scores`, failing when no score is usable.
fn predicted_class(scores: &[f32]) -> Result<usize> {
    argmax(scores).ok_or(CamError::NoValidScore {
        n_classes: scores.len(),
    })
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CamError::Serialization(format!("{:?}", e)))
}

/// Gradient-weighted class activation mapping over one classifier stage.
///
/// The explainer owns the classifier and the capture slots installed on its
/// target layer. Every call to [`GradCam::explain`] runs one forward and one
/// backward pass and overwrites both snapshots; `&mut self` keeps calls from
/// interleaving. Share an explainer across threads behind a mutex.
pub struct GradCam<B: AutodiffBackend, M: CamClassifier<B>> {
    model: M,
    hooks: CaptureHooks<B>,
    config: GradCamConfig,
}

impl<B: AutodiffBackend, M: CamClassifier<B>> GradCam<B, M> {
    /// Attach to `target_layer` of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::UnknownLayer`] if the model has no such stage.
    pub fn new(model: M, target_layer: &str) -> Result<Self> {
        Self::from_config(model, GradCamConfig::new(target_layer))
    }

    /// Attach using a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::UnknownLayer`] if the model has no such stage.
    pub fn from_config(model: M, config: GradCamConfig) -> Result<Self> {
        let hooks = CaptureHooks::register(&model, &config.target_layer)?;
        Ok(Self {
            model,
            hooks,
            config,
        })
    }

    /// The explained classifier.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Name of the target layer.
    pub fn target_layer(&self) -> &str {
        self.hooks.layer()
    }

    /// Activation snapshot of the latest call.
    pub fn last_activation(&self) -> Option<&Tensor<B, 4>> {
        self.hooks.activation()
    }

    /// Gradient snapshot of the latest call.
    pub fn last_gradient(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.hooks.gradient()
    }

    /// Explain the classifier's decision on `input`.
    ///
    /// `input` must be a batch of one image matching the classifier's input
    /// shape. Without `target_class` the highest-scoring class is explained.
    ///
    /// # Errors
    ///
    /// - [`CamError::InvalidInputShape`] if `input` does not match
    /// - [`CamError::InvalidTargetClass`] if `target_class` is out of range
    /// - [`CamError::NoValidScore`] if every score is NaN and no class is given
    /// - [`CamError::NoGradientCaptured`] if the backward pass misses the layer
    pub fn explain(
        &mut self,
        input: Tensor<B, 4>,
        target_class: Option<usize>,
    ) -> Result<Explanation> {
        let shape = self.model.input_shape();
        shape.validate_batched(input.dims())?;

        self.hooks.clear();
        let input = input.detach().require_grad();
        let logits = self.model.forward_observed(input, &mut self.hooks);

        let scores = tensor_values(logits.clone().inner())?;
        let n_classes = scores.len();
        let class_index = match target_class {
            Some(index) if index < n_classes => index,
            Some(index) => return Err(CamError::InvalidTargetClass { index, n_classes }),
            None => predicted_class(&scores)?,
        };

        let grads = logits
            .slice([0..1, class_index..class_index + 1])
            .sum()
            .backward();
        self.hooks.collect_gradient(&grads)?;

        let missing = || CamError::NoGradientCaptured {
            layer: self.hooks.layer().to_string(),
        };
        let activation = self.hooks.activation().ok_or_else(missing)?.clone().inner();
        let gradient = self.hooks.gradient().ok_or_else(missing)?.clone();

        let cam = grad_cam(activation, gradient);
        let [_, _, height, width] = cam.dims();
        let raw = Array2::from_shape_vec((height, width), tensor_values(cam)?)
            .map_err(|e| CamError::shape(format!("({}, {})", height, width), e))?;

        let mut values = bilinear_resize(raw.view(), shape.height(), shape.width());
        normalize_unit_interval(&mut values, self.config.epsilon);

        tracing::debug!(
            "Grad-CAM on '{}' for class {}: {}x{} -> {}x{}",
            self.hooks.layer(),
            class_index,
            height,
            width,
            shape.height(),
            shape.width()
        );

        Ok(Explanation {
            heatmap: Heatmap::new(values),
            class_index,
            scores,
            feature_size: (height, width),
        })
    }
}

impl<B, M> GradCam<B, M>
where
    B: AutodiffBackend,
    M: CamClassifier<B> + AutodiffModule<B>,
    M::InnerModule: CamClassifier<B::InnerBackend>,
{
    /// Forward-only classification on the inner backend.
    ///
    /// Does not touch the snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::InvalidInputShape`] if `input` does not match.
    pub fn predict(&self, input: Tensor<B::InnerBackend, 4>) -> Result<Prediction> {
        self.model.input_shape().validate_batched(input.dims())?;
        let scores = tensor_values(self.model.valid().classify(input))?;
        let class_index = predicted_class(&scores)?;
        Ok(Prediction {
            class_index,
            scores,
        })
    }
}
