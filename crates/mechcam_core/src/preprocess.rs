//! Resize-and-normalize preprocessing from RGB frames to model input tensors.

use burn::prelude::*;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};
use crate::frame::RgbFrame;
use crate::interpolate::bilinear_resize;
use crate::shape::ImageShape;

/// ImageNet per-channel mean.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Configuration for [`Preprocess`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length of the square model input.
    pub image_size: usize,
    /// Per-channel mean subtracted after scaling to `[0, 1]`.
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction.
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl PreprocessConfig {
    /// Create a config for the given input size with ImageNet statistics.
    #[must_use]
    pub fn new(image_size: usize) -> Self {
        Self {
            image_size,
            ..Default::default()
        }
    }

    /// Set the normalization statistics.
    #[must_use]
    pub fn with_stats(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    /// Build the preprocessor.
    ///
    /// # Errors
    ///
    /// Fails if the image size is zero or any standard deviation is not
    /// strictly positive.
    pub fn init(&self) -> Result<Preprocess> {
        if self.image_size == 0 {
            return Err(CamError::InvalidFrame("image size must be non-zero".to_string()));
        }
        if self.std.iter().any(|&s| s.is_nan() || s <= 0.0) {
            return Err(CamError::InvalidFrame(format!(
                "standard deviations must be positive, got {:?}",
                self.std
            )));
        }
        Ok(Preprocess {
            config: self.clone(),
        })
    }
}

/// Converts frames of arbitrary size to normalized `[1, 3, S, S]` tensors.
#[derive(Debug, Clone)]
pub struct Preprocess {
    config: PreprocessConfig,
}

impl Preprocess {
    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Shape of one produced image.
    #[must_use]
    pub fn output_shape(&self) -> ImageShape {
        ImageShape::rgb(self.config.image_size)
    }

    /// Resize and normalize into a flat CHW buffer.
    ///
    /// Resizing samples bilinearly without an antialiasing filter, so large
    /// frames downscaled here differ slightly from an antialiased resize
    /// (such as PIL's) and can occasionally change the predicted class.
    #[must_use]
    pub fn normalize(&self, frame: &RgbFrame) -> Vec<f32> {
        let size = self.config.image_size;
        let mut data = Vec::with_capacity(3 * size * size);
        for channel in 0..3 {
            let plane = bilinear_resize(frame.channel_unit(channel).view(), size, size);
            let mean = self.config.mean[channel];
            let std = self.config.std[channel];
            data.extend(plane.iter().map(|&v| (v - mean) / std));
        }
        data
    }

    /// Resize and normalize into a batch-of-one tensor.
    pub fn to_tensor<B: Backend>(&self, frame: &RgbFrame, device: &B::Device) -> Tensor<B, 4> {
        let shape = self.output_shape().batched();
        Tensor::from_data(TensorData::new(self.normalize(frame), shape), device)
    }

    /// Copy of the frame resized to the model input size, for display.
    #[must_use]
    pub fn display_frame(&self, frame: &RgbFrame) -> RgbFrame {
        frame.resize(self.config.image_size, self.config.image_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_default_config() {
        let config = PreprocessConfig::default();
        assert_eq!(config.image_size, 224);
        assert_eq!(config.mean, [0.485, 0.456, 0.406]);
        assert_eq!(config.std, [0.229, 0.224, 0.225]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(PreprocessConfig::new(0).init().is_err());
        let config = PreprocessConfig::new(8).with_stats([0.0; 3], [1.0, 0.0, 1.0]);
        assert!(config.init().is_err());
    }

    #[test]
    fn test_black_frame_normalizes_to_negative_mean_over_std() {
        let pre = PreprocessConfig::new(4).init().unwrap();
        let frame = RgbFrame::filled(9, 5, [0, 0, 0]).unwrap();
        let data = pre.normalize(&frame);
        assert_eq!(data.len(), 3 * 4 * 4);
        for channel in 0..3 {
            let expected = -IMAGENET_MEAN[channel] / IMAGENET_STD[channel];
            for &v in &data[channel * 16..(channel + 1) * 16] {
                assert!((v - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_downscale_samples_without_antialiasing() {
        // A bright first column covers a quarter of the left output pixel,
        // but bilinear sampling at 4x reduction only reads columns 1 and 2.
        let mut pixels = vec![0u8; 8 * 8 * 3];
        for y in 0..8 {
            pixels[y * 8 * 3..y * 8 * 3 + 3].copy_from_slice(&[255, 255, 255]);
        }
        let frame = RgbFrame::from_raw(8, 8, pixels).unwrap();
        let pre = PreprocessConfig::new(2)
            .with_stats([0.0; 3], [1.0; 3])
            .init()
            .unwrap();

        let data = pre.normalize(&frame);
        assert!(data.iter().all(|&v| v == 0.0), "{data:?}");
    }

    #[test]
    fn test_to_tensor_shape() {
        let device = Default::default();
        let pre = PreprocessConfig::new(16).init().unwrap();
        let frame = RgbFrame::filled(40, 30, [128, 64, 255]).unwrap();
        let tensor = pre.to_tensor::<TestBackend>(&frame, &device);
        assert_eq!(tensor.dims(), [1, 3, 16, 16]);
    }

    #[test]
    fn test_display_frame_size() {
        let pre = PreprocessConfig::new(12).init().unwrap();
        let frame = RgbFrame::filled(40, 30, [1, 2, 3]).unwrap();
        let display = pre.display_frame(&frame);
        assert_eq!((display.width(), display.height()), (12, 12));
    }
}
