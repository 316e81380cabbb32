//! Classifier trait used by the explainer.

use burn::prelude::*;
use mechcam_core::ImageShape;

use crate::observer::{LayerObserver, Passthrough};

/// An image classifier whose internal stages can be observed.
///
/// Implementations must call the observer for every name returned by
/// [`CamClassifier::observable_layers`] and continue the forward pass with
/// the tensor the observer hands back; otherwise gradients at that stage
/// cannot be recovered.
pub trait CamClassifier<B: Backend>: Module<B> {
    /// Forward pass returning logits of shape `(batch, n_classes)`.
    fn forward_observed(
        &self,
        x: Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2>;

    /// Forward pass without observation.
    fn classify(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_observed(x, &mut Passthrough)
    }

    /// Shape of one input image.
    fn input_shape(&self) -> ImageShape;

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Stage names that are reported to observers.
    fn observable_layers(&self) -> &'static [&'static str];
}
