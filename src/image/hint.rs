//! Color hint composition.
//!
//! The generator takes hints as four channels: the hint color remapped to
//! `[-1, 1]` and zeroed outside the mask, followed by the mask itself. The
//! explicit mask channel is what separates "the user painted black here" from
//! "no hint here".

use ndarray::{s, Array2, Array3, Array4, ArrayView2, Zip};

use crate::error::{Error, Result};

use super::{HintTensor, HINT_CHANNELS, RGB_CHANNELS};

/// A user color hint in HWC layout, tagged with its value range.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    /// 8-bit pixels in `0..=255`.
    Pixels(Array3<u8>),
    /// Floats in `[0, 1]`.
    Unit(Array3<f32>),
    /// Floats already in the generator's `[-1, 1]` range.
    Centered(Array3<f32>),
}

impl Hint {
    /// Dimensions `(height, width, channels)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::Pixels(pixels) => pixels.dim(),
            Self::Unit(values) | Self::Centered(values) => values.dim(),
        }
    }

    /// Hint values remapped to `[-1, 1]`.
    #[must_use]
    pub fn centered(&self) -> Array3<f32> {
        match self {
            Self::Pixels(pixels) => pixels.mapv(|v| center(f32::from(v) / 255.0)),
            Self::Unit(values) => values.mapv(center),
            Self::Centered(values) => values.clone(),
        }
    }
}

#[inline]
fn center(value: f32) -> f32 {
    (value - 0.5) / 0.5
}

/// An all-zero hint tensor: no hint anywhere.
#[must_use]
pub fn blank_hint(height: usize, width: usize) -> HintTensor {
    Array4::zeros((1, HINT_CHANNELS, height, width))
}

/// Reduce a mask to exactly `0.0` and `1.0`; any non-zero value applies the hint.
#[must_use]
pub fn binarize_mask(mask: ArrayView2<'_, f32>) -> Array2<f32> {
    mask.mapv(|v| if v == 0.0 { 0.0 } else { 1.0 })
}

/// Build the 4-channel hint tensor for a canvas of `canvas` `(height, width)`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChannels`] if the hint is not RGB and
/// [`Error::HintShapeMismatch`] if the hint or mask does not cover exactly
/// the canvas.
pub fn compose_hint(
    hint: &Hint,
    mask: ArrayView2<'_, f32>,
    canvas: (usize, usize),
) -> Result<HintTensor> {
    let (height, width, channels) = hint.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::UnsupportedChannels { channels });
    }
    if (height, width) != canvas {
        return Err(Error::HintShapeMismatch {
            expected: canvas,
            actual: (height, width),
        });
    }
    if mask.dim() != canvas {
        return Err(Error::HintShapeMismatch {
            expected: canvas,
            actual: mask.dim(),
        });
    }

    let mask = binarize_mask(mask);
    let color = hint.centered();
    let mut tensor = blank_hint(height, width);

    for channel in 0..RGB_CHANNELS {
        Zip::from(tensor.slice_mut(s![0, channel, .., ..]))
            .and(color.slice(s![.., .., channel]))
            .and(&mask)
            .for_each(|out, &value, &applied| {
                *out = if applied > 0.0 { value } else { 0.0 };
            });
    }
    tensor.slice_mut(s![0, RGB_CHANNELS, .., ..]).assign(&mask);

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn half_mask(height: usize, width: usize) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(_, x)| if x < width / 2 { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_color_is_zero_outside_mask() {
        let hint = Hint::Unit(Array3::from_elem((8, 8, 3), 0.9));
        let mask = half_mask(8, 8);
        let tensor = compose_hint(&hint, mask.view(), (8, 8)).unwrap();

        for y in 0..8 {
            for x in 4..8 {
                for c in 0..3 {
                    assert_eq!(tensor[[0, c, y, x]].to_bits(), 0.0_f32.to_bits());
                }
            }
            assert!((tensor[[0, 0, y, 0]] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_nan_outside_mask_is_still_zero() {
        let hint = Hint::Centered(Array3::from_elem((2, 2, 3), f32::NAN));
        let mask = Array2::zeros((2, 2));
        let tensor = compose_hint(&hint, mask.view(), (2, 2)).unwrap();
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pixel_hint_normalization() {
        let mut pixels = Array3::<u8>::zeros((1, 2, 3));
        pixels[[0, 1, 0]] = 255;
        let tensor = compose_hint(&Hint::Pixels(pixels), Array2::ones((1, 2)).view(), (1, 2))
            .unwrap();

        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < f32::EPSILON);
        assert!((tensor[[0, 0, 0, 1]] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unit_and_centered_ranges() {
        let unit = Hint::Unit(Array3::from_elem((1, 1, 3), 0.5));
        assert!(unit.centered().iter().all(|v| v.abs() < f32::EPSILON));

        let centered = Hint::Centered(Array3::from_elem((1, 1, 3), -0.25));
        assert!(centered.centered().iter().all(|v| (v + 0.25).abs() < f32::EPSILON));
    }

    #[test]
    fn test_mask_channel_is_binary() {
        let hint = Hint::Unit(Array3::zeros((2, 2, 3)));
        let mask = Array2::from_shape_vec((2, 2), vec![0.0, 0.3, 7.0, -1.0]).unwrap();
        let tensor = compose_hint(&hint, mask.view(), (2, 2)).unwrap();

        let channel: Vec<f32> = tensor.slice(s![0, 3, .., ..]).iter().copied().collect();
        assert_eq!(channel, vec![0.0, 1.0, 1.0, 1.0]);
        // Black hint inside the mask stays distinguishable from no hint
        assert!((tensor[[0, 0, 0, 1]] + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_shape_mismatch_is_usage_error() {
        let hint = Hint::Unit(Array3::zeros((4, 4, 3)));
        let err = compose_hint(&hint, Array2::zeros((4, 4)).view(), (8, 8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(matches!(
            err,
            Error::HintShapeMismatch {
                expected: (8, 8),
                actual: (4, 4)
            }
        ));

        let err = compose_hint(&hint, Array2::zeros((4, 5)).view(), (4, 4)).unwrap_err();
        assert!(matches!(err, Error::HintShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_non_rgb_hint() {
        let hint = Hint::Unit(Array3::zeros((4, 4, 1)));
        assert!(matches!(
            compose_hint(&hint, Array2::zeros((4, 4)).view(), (4, 4)),
            Err(Error::UnsupportedChannels { channels: 1 })
        ));
    }

    #[test]
    fn test_blank_hint_shape() {
        let blank = blank_hint(384, 576);
        assert_eq!(blank.shape(), &[1, 4, 384, 576]);
        assert!(blank.iter().all(|&v| v == 0.0));
    }
}
