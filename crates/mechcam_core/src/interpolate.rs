//! Bilinear resampling with half-pixel centres (`align_corners = false`).

use ndarray::{Array2, ArrayView2};

/// Source coordinate for output index `dst` when mapping `input` samples
/// onto `output` samples with half-pixel centre alignment.
///
/// Negative coordinates clamp to 0 so the first output row/column never
/// extrapolates.
#[inline]
fn source_coord(dst: usize, input: usize, output: usize) -> f32 {
    let scale = input as f32 / output as f32;
    ((dst as f32 + 0.5) * scale - 0.5).max(0.0)
}

/// Lower neighbour, upper neighbour and the weight of the upper one.
#[inline]
fn neighbours(dst: usize, input: usize, output: usize) -> (usize, usize, f32) {
    let src = source_coord(dst, input, output);
    let lo = (src.floor() as usize).min(input - 1);
    let hi = (lo + 1).min(input - 1);
    (lo, hi, src - lo as f32)
}

/// Resize a 2D plane to `(out_height, out_width)` with bilinear
/// interpolation.
///
/// Matches the usual `align_corners = false` convention: pixel `i` of the
/// output samples the input at `(i + 0.5) * in / out - 0.5`. Resizing to the
/// same size is the identity.
///
/// An empty input or a zero output side yields an empty array of the
/// requested size.
#[must_use]
pub fn bilinear_resize(input: ArrayView2<'_, f32>, out_height: usize, out_width: usize) -> Array2<f32> {
    let (in_height, in_width) = input.dim();
    let mut out = Array2::<f32>::zeros((out_height, out_width));
    if in_height == 0 || in_width == 0 || out_height == 0 || out_width == 0 {
        return out;
    }

    let cols: Vec<(usize, usize, f32)> = (0..out_width)
        .map(|x| neighbours(x, in_width, out_width))
        .collect();

    for y in 0..out_height {
        let (y0, y1, wy) = neighbours(y, in_height, out_height);
        for (x, &(x0, x1, wx)) in cols.iter().enumerate() {
            let top = input[[y0, x0]] * (1.0 - wx) + input[[y0, x1]] * wx;
            let bottom = input[[y1, x0]] * (1.0 - wx) + input[[y1, x1]] * wx;
            out[[y, x]] = top * (1.0 - wy) + bottom * wy;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_same_size_is_identity() {
        let input = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let out = bilinear_resize(input.view(), 2, 3);
        assert_eq!(out, input);
    }

    #[test]
    fn test_upsample_2x_half_pixel() {
        // 1x2 -> 1x4: sources at -0.25 (clamped to 0), 0.25, 0.75, 1.25
        let input = array![[0.0f32, 4.0]];
        let out = bilinear_resize(input.view(), 1, 4);
        let expected = [0.0f32, 1.0, 3.0, 4.0];
        for (got, want) in out.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_single_pixel_broadcasts() {
        let input = array![[0.5f32]];
        let out = bilinear_resize(input.view(), 7, 7);
        assert_eq!(out.dim(), (7, 7));
        assert!(out.iter().all(|&v| (v - 0.5).abs() < 1e-7));
    }

    #[test]
    fn test_downsample_averages_pairs() {
        // 1x4 -> 1x2: sources at 0.5 and 2.5
        let input = array![[0.0f32, 2.0, 4.0, 6.0]];
        let out = bilinear_resize(input.view(), 1, 2);
        assert!((out[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((out[[0, 1]] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        let input = Array2::<f32>::zeros((0, 0));
        let out = bilinear_resize(input.view(), 3, 3);
        assert_eq!(out.dim(), (3, 3));
    }
}
