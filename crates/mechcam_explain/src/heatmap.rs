//! Normalized saliency heatmaps.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Single-channel importance map with values in `[0, 1]`, stored `(height, width)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "HeatmapData", try_from = "HeatmapData")]
pub struct Heatmap {
    values: Array2<f32>,
}

/// Flat serialized form of a [`Heatmap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapData {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Row-major values.
    pub values: Vec<f32>,
}

impl Heatmap {
    /// Wrap normalized values.
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Value at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[[y, x]]
    }

    /// The underlying array.
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Smallest value.
    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest value.
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// `(x, y)` of the largest value; first in row-major order on ties.
    pub fn peak(&self) -> (usize, usize) {
        let mut best = (0, 0);
        let mut best_value = f32::NEG_INFINITY;
        for ((y, x), &v) in self.values.indexed_iter() {
            if v > best_value {
                best_value = v;
                best = (x, y);
            }
        }
        best
    }

    /// Coarse text rendering for terminals.
    pub fn to_ascii(&self, width: usize, height: usize) -> String {
        if self.values.is_empty() || width == 0 || height == 0 {
            return String::new();
        }

        let chars = [' ', '░', '▒', '▓', '█'];
        let n_rows = self.height();
        let n_cols = self.width();

        // Sample rows and columns to fit dimensions
        let row_step = (n_rows as f32 / height as f32).max(1.0);
        let col_step = (n_cols as f32 / width as f32).max(1.0);

        let mut output = String::new();
        for h in 0..height.min(n_rows) {
            let r = (h as f32 * row_step) as usize;
            if r >= n_rows {
                break;
            }
            for w in 0..width.min(n_cols) {
                let c = (w as f32 * col_step) as usize;
                if c >= n_cols {
                    break;
                }
                let val = self.values[[r, c]].clamp(0.0, 1.0);
                let char_idx = (val * (chars.len() - 1) as f32).round() as usize;
                output.push(chars[char_idx]);
            }
            output.push('\n');
        }

        output
    }
}

impl From<Heatmap> for HeatmapData {
    fn from(map: Heatmap) -> Self {
        Self {
            width: map.width(),
            height: map.height(),
            values: map.values.iter().copied().collect(),
        }
    }
}

impl TryFrom<HeatmapData> for Heatmap {
    type Error = String;

    fn try_from(data: HeatmapData) -> Result<Self, Self::Error> {
        Array2::from_shape_vec((data.height, data.width), data.values)
            .map(Self::new)
            .map_err(|e| format!("heatmap of {}x{}: {}", data.width, data.height, e))
    }
}
