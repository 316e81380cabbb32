//! Heatmap-over-image compositing.

use mechcam_core::{CamError, Result, RgbFrame};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::heatmap::Heatmap;

/// Configuration for [`overlay`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Opacity of the colour-mapped heatmap, in `[0, 1]`.
    pub alpha: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { alpha: 0.5 }
    }
}

impl OverlayConfig {
    /// Create with the given opacity.
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }
}

/// Map `value` in `[0, 1]` to the jet colour scale (blue, cyan, yellow, red).
pub fn jet(value: f32) -> [u8; 3] {
    let v = value.clamp(0.0, 1.0) * 4.0;
    let channel = |centre: f32| {
        let c = (1.5 - (v - centre).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Blend the jet-coloured heatmap over `frame`.
///
/// # Errors
///
/// Fails with [`CamError::InvalidFrame`] if the sizes differ or the opacity
/// is outside `[0, 1]`.
pub fn overlay(frame: &RgbFrame, heatmap: &Heatmap, config: &OverlayConfig) -> Result<RgbFrame> {
    if frame.width() != heatmap.width() || frame.height() != heatmap.height() {
        return Err(CamError::InvalidFrame(format!(
            "frame is {}x{} but heatmap is {}x{}",
            frame.width(),
            frame.height(),
            heatmap.width(),
            heatmap.height()
        )));
    }
    if !(0.0..=1.0).contains(&config.alpha) {
        return Err(CamError::InvalidFrame(format!(
            "overlay alpha must be in [0, 1], got {}",
            config.alpha
        )));
    }

    let alpha = config.alpha;
    let base = frame.as_array();
    let out = Array3::from_shape_fn(base.dim(), |(y, x, c)| {
        let colour = f32::from(jet(heatmap.get(x, y))[c]);
        let pixel = f32::from(base[[y, x, c]]);
        ((1.0 - alpha) * pixel + alpha * colour).round().clamp(0.0, 255.0) as u8
    });
    RgbFrame::from_array(out)
}
