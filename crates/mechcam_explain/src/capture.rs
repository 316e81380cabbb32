//! Activation and gradient capture for one observed layer.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use mechcam_core::{CamError, Result};
use mechcam_models::{CamClassifier, LayerObserver};

/// Captured output of the observed layer from the latest forward pass.
///
/// The captured tensor is re-rooted as a tracked leaf so the backward pass
/// deposits a gradient on it.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: AutodiffBackend> {
    layer: String,
    activation: Option<Tensor<B, 4>>,
}

impl<B: AutodiffBackend> ActivationCapture<B> {
    /// Create an empty capture for `layer`.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            activation: None,
        }
    }

    /// Name of the observed layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The captured activation, if the layer fired.
    pub fn get(&self) -> Option<&Tensor<B, 4>> {
        self.activation.as_ref()
    }

    /// Clear the stored activation.
    pub fn clear(&mut self) {
        self.activation = None;
    }
}

impl<B: AutodiffBackend> LayerObserver<B> for ActivationCapture<B> {
    fn observe(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if layer != self.layer {
            return output;
        }
        let tracked = output.detach().require_grad();
        self.activation = Some(tracked.clone());
        tracked
    }
}

/// Gradient of the target score with respect to the captured activation.
#[derive(Debug, Clone)]
pub struct GradientCapture<B: AutodiffBackend> {
    gradient: Option<Tensor<B::InnerBackend, 4>>,
}

impl<B: AutodiffBackend> GradientCapture<B> {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self { gradient: None }
    }

    /// Pull the gradient of `activation` out of `grads`.
    ///
    /// Returns whether a gradient was found.
    pub fn collect(&mut self, activation: &Tensor<B, 4>, grads: &B::Gradients) -> bool {
        self.gradient = activation.grad(grads);
        self.gradient.is_some()
    }

    /// The captured gradient, if any.
    pub fn get(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.gradient.as_ref()
    }

    /// Clear the stored gradient.
    pub fn clear(&mut self) {
        self.gradient = None;
    }
}

impl<B: AutodiffBackend> Default for GradientCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two capture slots installed on a classifier layer.
///
/// Passed as the observer of every forward pass; both slots belong to the
/// same forward/backward pair until [`CaptureHooks::clear`] is called.
#[derive(Debug, Clone)]
pub struct CaptureHooks<B: AutodiffBackend> {
    activation: ActivationCapture<B>,
    gradient: GradientCapture<B>,
}

impl<B: AutodiffBackend> CaptureHooks<B> {
    /// Register capture slots on `layer` of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::UnknownLayer`] if the model does not report a
    /// stage with that name.
    pub fn register<M: CamClassifier<B>>(model: &M, layer: &str) -> Result<Self> {
        let available = model.observable_layers();
        if !available.contains(&layer) {
            return Err(CamError::UnknownLayer {
                layer: layer.to_string(),
                available: available.iter().map(|s| s.to_string()).collect(),
            });
        }
        Ok(Self {
            activation: ActivationCapture::new(layer),
            gradient: GradientCapture::new(),
        })
    }

    /// Name of the observed layer.
    pub fn layer(&self) -> &str {
        self.activation.layer()
    }

    /// Activation snapshot.
    pub fn activation(&self) -> Option<&Tensor<B, 4>> {
        self.activation.get()
    }

    /// Gradient snapshot.
    pub fn gradient(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.gradient.get()
    }

    /// Capture the gradient of the activation snapshot from `grads`.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::NoGradientCaptured`] if the layer never fired or
    /// the backward pass did not reach it.
    pub fn collect_gradient(&mut self, grads: &B::Gradients) -> Result<()> {
        let found = match self.activation.get() {
            Some(activation) => self.gradient.collect(activation, grads),
            None => false,
        };
        if !found {
            return Err(CamError::NoGradientCaptured {
                layer: self.layer().to_string(),
            });
        }
        Ok(())
    }

    /// Drop both snapshots.
    pub fn clear(&mut self) {
        self.activation.clear();
        self.gradient.clear();
    }
}

impl<B: AutodiffBackend> LayerObserver<B> for CaptureHooks<B> {
    fn observe(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        self.activation.observe(layer, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechcam_core::backend::CpuAutodiff;
    use mechcam_models::ResNetConfig;

    type TestBackend = CpuAutodiff;

    #[test]
    fn test_activation_capture_ignores_other_layers() {
        let device = Default::default();
        let mut capture: ActivationCapture<TestBackend> = ActivationCapture::new("layer4");
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device);

        let _ = capture.observe("layer3", x.clone());
        assert!(capture.get().is_none());

        let _ = capture.observe("layer4", x);
        assert_eq!(capture.get().map(Tensor::dims), Some([1, 2, 3, 3]));

        capture.clear();
        assert!(capture.get().is_none());
    }

    #[test]
    fn test_gradient_flows_to_captured_leaf() {
        let device = Default::default();
        let mut capture: ActivationCapture<TestBackend> = ActivationCapture::new("detour");
        let x = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);

        let tracked = capture.observe("detour", x);
        let loss = (tracked * 3.0).sum();
        let grads = loss.backward();

        let mut gradient = GradientCapture::<TestBackend>::new();
        assert!(gradient.collect(capture.get().unwrap(), &grads));
        let total: f32 = gradient.get().unwrap().clone().sum().into_scalar().elem();
        assert!((total - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_register_unknown_layer() {
        let device = Default::default();
        let model = ResNetConfig::tiny(4, 32).init::<TestBackend>(&device);
        let err = CaptureHooks::register(&model, "layer9").unwrap_err();
        assert!(matches!(err, CamError::UnknownLayer { .. }));
        assert!(CaptureHooks::register(&model, "layer4").is_ok());
    }

    #[test]
    fn test_collect_without_forward_fails() {
        let device = Default::default();
        let model = ResNetConfig::tiny(4, 32).init::<TestBackend>(&device);
        let mut hooks = CaptureHooks::register(&model, "layer4").unwrap();

        let unrelated = Tensor::<TestBackend, 1>::ones([1], &device).require_grad();
        let grads = unrelated.sum().backward();
        let err = hooks.collect_gradient(&grads).unwrap_err();
        assert!(matches!(err, CamError::NoGradientCaptured { .. }));
    }
}
