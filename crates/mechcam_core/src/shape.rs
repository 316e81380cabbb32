//! Image tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// Shape of a single image fed to a classifier, `(C, H, W)`.
///
/// Batched tensors follow the convention `(1, C, H, W)`; only batch size 1
/// is accepted by the explainer.
///
/// # Example
///
/// ```rust
/// use mechcam_core::ImageShape;
///
/// let shape = ImageShape::rgb(224);
/// assert_eq!(shape.batched(), [1, 3, 224, 224]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Square RGB image of the given side length.
    #[must_use]
    pub const fn rgb(size: usize) -> Self {
        Self::new(3, size, size)
    }

    /// Number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Total number of elements of one image.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Dimensions of a batch-of-one tensor.
    #[must_use]
    pub const fn batched(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }

    /// Check that a 4D tensor shape is a batch of one image of this shape.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::InvalidInputShape`] on any mismatch, including a
    /// batch size other than 1.
    pub fn validate_batched(&self, dims: [usize; 4]) -> Result<()> {
        if dims != self.batched() {
            return Err(CamError::shape(
                format!("{:?}", self.batched()),
                format!("{:?}", dims),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.channels, self.height, self.width)
    }
}
