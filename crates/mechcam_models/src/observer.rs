//! Explicit observation points for classifier stages.

use burn::prelude::*;

/// Receives the output of every observable stage during a forward pass.
///
/// The classifier calls [`LayerObserver::observe`] after computing each named
/// stage and continues with the tensor the observer returns. An observer may
/// return the tensor unchanged, or re-root it in the autodiff graph to
/// capture the gradient flowing back into it.
pub trait LayerObserver<B: Backend> {
    /// Observe the output of `layer`, returning the tensor to continue with.
    fn observe(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<B: Backend> LayerObserver<B> for Passthrough {
    fn observe(&mut self, _layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        output
    }
}

/// Records the output dimensions of every stage it sees.
#[derive(Debug, Clone, Default)]
pub struct ShapeRecorder {
    shapes: Vec<(String, [usize; 4])>,
}

impl ShapeRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(layer, dims)` pairs in forward order.
    pub fn shapes(&self) -> &[(String, [usize; 4])] {
        &self.shapes
    }

    /// Dims recorded for `layer`, if it fired.
    pub fn get(&self, layer: &str) -> Option<[usize; 4]> {
        self.shapes
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, dims)| *dims)
    }
}

impl<B: Backend> LayerObserver<B> for ShapeRecorder {
    fn observe(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        self.shapes.push((layer.to_string(), output.dims()));
        output
    }
}
