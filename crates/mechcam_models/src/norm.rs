//! Batch normalization with frozen statistics.

use burn::module::Param;
use burn::prelude::*;

/// Batch normalization that always uses its running statistics.
///
/// Burn's `BatchNorm` switches to batch statistics whenever the backend
/// tracks gradients. Explanations run on an autodiff backend but must see
/// the same activations as plain inference, so this layer applies the
/// inference formula unconditionally:
///
/// `y = (x - running_mean) / sqrt(running_var + epsilon) * gamma + beta`
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    /// Scale.
    pub gamma: Param<Tensor<B, 1>>,
    /// Shift.
    pub beta: Param<Tensor<B, 1>>,
    /// Running mean.
    pub running_mean: Param<Tensor<B, 1>>,
    /// Running variance.
    pub running_var: Param<Tensor<B, 1>>,
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    /// Identity-initialized normalization over `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
            epsilon: 1e-5,
        }
    }

    /// Number of normalized channels.
    pub fn channels(&self) -> usize {
        let [channels] = self.gamma.dims();
        channels
    }

    /// Forward pass over `(batch, channels, height, width)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shape = [1, self.channels(), 1, 1];
        let scale = self.gamma.val() / (self.running_var.val() + self.epsilon).sqrt();
        let shift = self.beta.val() - self.running_mean.val() * scale.clone();
        x * scale.reshape(shape) + shift.reshape(shape)
    }
}
