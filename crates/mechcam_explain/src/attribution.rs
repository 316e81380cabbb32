//! Grad-CAM map computation.

use burn::prelude::*;
use ndarray::Array2;

/// Default epsilon added to the normalization range.
pub const NORMALIZE_EPSILON: f32 = 1e-8;

/// Compute the raw Grad-CAM map.
///
/// # Arguments
///
/// * `activations` - Activations of the observed layer (batch, channels, h, w)
/// * `gradients` - Gradients w.r.t. those activations (batch, channels, h, w)
///
/// # Returns
///
/// Non-negative map of shape (batch, 1, h, w).
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Tensor<B, 4> {
    // Global average pool the gradients: (batch, channels, h, w) -> (batch, channels, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weighted sum over channels: -> (batch, 1, h, w)
    let cam = (activations * weights).sum_dim(1);

    // Keep only evidence for the class
    cam.clamp_min(0.0)
}

/// Min-max scale `values` in place to `[0, 1]`.
///
/// Uses `(x - min) / (max - min + epsilon)`, so a constant map becomes all
/// zeros instead of NaN.
pub fn normalize_unit_interval(values: &mut Array2<f32>, epsilon: f32) {
    if values.is_empty() {
        return;
    }
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let denom = max - min + epsilon;
    values.mapv_inplace(|v| ((v - min) / denom).clamp(0.0, 1.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechcam_core::backend::NdArray;
    use ndarray::array;

    type TestBackend = NdArray;

    #[test]
    fn test_grad_cam_shape() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);

        let cam = grad_cam(activations, gradients);
        assert_eq!(cam.dims(), [1, 1, 7, 7]);
    }

    #[test]
    fn test_grad_cam_weights_channels() {
        let device = Default::default();
        // channel 0: constant 1, channel 1: ramp 0.5..2.0
        let activations = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 1.0], [1.0, 1.0]], [[0.5, 1.0], [1.5, 2.0]]]],
            &device,
        );
        // mean gradient: channel 0 -> 1.0, channel 1 -> 0.1
        let gradients = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 1.0], [1.0, 1.0]], [[0.0, 0.0], [0.0, 0.4]]]],
            &device,
        );

        let cam = grad_cam(activations, gradients);
        let values: Vec<f32> = cam.into_data().to_vec().unwrap();
        let expected = [1.05, 1.1, 1.15, 1.2];
        for (got, want) in values.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_grad_cam_discards_negative_evidence() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device) * -1.0;

        let cam = grad_cam(activations, gradients);
        let max: f32 = cam.max().into_scalar().elem();
        assert_eq!(max, 0.0);
    }

    #[test]
    fn test_normalize_range() {
        let mut values = array![[2.0f32, 4.0], [6.0, 10.0]];
        normalize_unit_interval(&mut values, NORMALIZE_EPSILON);
        assert_eq!(values[[0, 0]], 0.0);
        assert!((values[[1, 1]] - 1.0).abs() < 1e-6);
        assert!((values[[0, 1]] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_constant_map_is_finite() {
        let mut values = Array2::<f32>::zeros((4, 4));
        normalize_unit_interval(&mut values, NORMALIZE_EPSILON);
        assert!(values.iter().all(|v| *v == 0.0));

        let mut values = Array2::<f32>::from_elem((3, 3), 5.0);
        normalize_unit_interval(&mut values, NORMALIZE_EPSILON);
        assert!(values.iter().all(|v| v.is_finite() && *v == 0.0));
    }
}
