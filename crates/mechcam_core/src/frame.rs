//! Decoded RGB pixel buffers.

use std::path::Path;

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};
use crate::interpolate::bilinear_resize;

/// An 8-bit RGB image stored as `(height, width, 3)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pixels: Array3<u8>,
}

/// On-disk representation of an [`RgbFrame`]: row-major interleaved RGB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameFile {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// `width * height * 3` bytes, row-major, RGB interleaved.
    pub pixels: Vec<u8>,
}

impl RgbFrame {
    /// Build a frame from interleaved RGB bytes.
    ///
    /// # Errors
    ///
    /// Fails if either side is zero or the buffer length is not
    /// `width * height * 3`.
    pub fn from_raw(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CamError::InvalidFrame(format!(
                "frame must have non-zero size, got {}x{}",
                width, height
            )));
        }
        let expected = width * height * 3;
        if pixels.len() != expected {
            return Err(CamError::InvalidFrame(format!(
                "pixel buffer has {} bytes but expected {} (width * height * 3)",
                pixels.len(),
                expected
            )));
        }
        let pixels = Array3::from_shape_vec((height, width, 3), pixels)
            .map_err(|e| CamError::InvalidFrame(e.to_string()))?;
        Ok(Self { pixels })
    }

    /// A frame filled with one colour.
    ///
    /// # Errors
    ///
    /// Fails if either side is zero.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Result<Self> {
        let pixels = (0..width * height).flat_map(|_| rgb).collect();
        Self::from_raw(width, height, pixels)
    }

    /// Wrap an existing `(height, width, 3)` array.
    ///
    /// # Errors
    ///
    /// Fails if the last axis is not 3 or the frame is empty.
    pub fn from_array(pixels: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if channels != 3 || height == 0 || width == 0 {
            return Err(CamError::InvalidFrame(format!(
                "expected (height, width, 3) with non-zero sides, got {:?}",
                pixels.dim()
            )));
        }
        Ok(Self { pixels })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// Pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        [
            self.pixels[[y, x, 0]],
            self.pixels[[y, x, 1]],
            self.pixels[[y, x, 2]],
        ]
    }

    /// Underlying `(height, width, 3)` array.
    #[must_use]
    pub fn as_array(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// One colour plane as `f32` in `[0, 1]`.
    #[must_use]
    pub fn channel_unit(&self, channel: usize) -> Array2<f32> {
        self.pixels
            .index_axis(Axis(2), channel)
            .mapv(|v| f32::from(v) / 255.0)
    }

    /// Bilinearly resize to `width x height`.
    #[must_use]
    pub fn resize(&self, width: usize, height: usize) -> Self {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        let mut out = Array3::<u8>::zeros((height, width, 3));
        for channel in 0..3 {
            let plane = self.pixels.index_axis(Axis(2), channel).mapv(f32::from);
            let resized = bilinear_resize(plane.view(), height, width);
            out.index_axis_mut(Axis(2), channel)
                .zip_mut_with(&resized, |dst, &src| {
                    *dst = src.round().clamp(0.0, 255.0) as u8;
                });
        }
        Self { pixels: out }
    }

    /// Convert into the serializable file form.
    #[must_use]
    pub fn to_file(&self) -> FrameFile {
        FrameFile {
            width: self.width(),
            height: self.height(),
            pixels: self.pixels.iter().copied().collect(),
        }
    }

    /// Read a JSON frame file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, malformed JSON or an inconsistent pixel buffer.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let file: FrameFile = serde_json::from_str(&json)?;
        Self::try_from(file)
    }

    /// Write this frame as a JSON frame file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(&self.to_file())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl TryFrom<FrameFile> for RgbFrame {
    type Error = CamError;

    fn try_from(file: FrameFile) -> Result<Self> {
        Self::from_raw(file.width, file.height, file.pixels)
    }
}
