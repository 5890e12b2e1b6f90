//! Aspect-preserving resize with bottom/right padding to the generator's alignment.

use image::{imageops::FilterType, ImageBuffer, Luma, Rgb};
use ndarray::{s, Array3, ArrayView3, Axis};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ColorImage, ALIGNMENT, RGB_CHANNELS};

/// Rows and columns added to the bottom and right edges of a resized image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddingRecord {
    /// Rows appended below the image.
    pub bottom: usize,
    /// Columns appended right of the image.
    pub right: usize,
}

impl PaddingRecord {
    /// Whether no padding was added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bottom == 0 && self.right == 0
    }
}

/// Fail unless `size` is a non-zero multiple of [`ALIGNMENT`].
///
/// # Errors
///
/// Returns [`Error::UnalignedSize`] for unaligned sizes.
pub fn check_alignment(size: usize) -> Result<()> {
    if size == 0 || size % ALIGNMENT != 0 {
        return Err(Error::UnalignedSize {
            size,
            alignment: ALIGNMENT,
        });
    }
    Ok(())
}

/// Round `value` up to the next multiple of [`ALIGNMENT`].
#[must_use]
pub const fn align_up(value: usize) -> usize {
    value.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Dimensions `(height, width)` after scaling the longer side to `target`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn scaled_dims(height: usize, width: usize, target: usize) -> (usize, usize) {
    let long_side = height.max(width);
    if long_side == target {
        return (height, width);
    }

    let scale = target as f64 / long_side as f64;
    // Safe: the scaled short side never exceeds `target`
    let short_side = (height.min(width) as f64 * scale).round().max(1.0) as usize;

    if height >= width {
        (target, short_side)
    } else {
        (short_side, target)
    }
}

/// Normalize an HWC image with 1, 3 or 4 channels to RGB.
///
/// Grayscale is replicated across channels and alpha is dropped.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChannels`] for any other channel count.
pub fn to_rgb(image: ArrayView3<'_, f32>) -> Result<ColorImage> {
    let (height, width, channels) = image.dim();
    match channels {
        1 => image
            .broadcast((height, width, RGB_CHANNELS))
            .map(|view| view.to_owned())
            .ok_or(Error::UnsupportedChannels { channels }),
        3 => Ok(image.to_owned()),
        4 => Ok(image.slice(s![.., .., ..RGB_CHANNELS]).to_owned()),
        _ => Err(Error::UnsupportedChannels { channels }),
    }
}

/// Resample a 1- or 3-channel HWC image to `(height, width)` with Lanczos3.
///
/// # Errors
///
/// Returns an error for unsupported channel counts or dimensions that do not
/// fit the image buffer.
pub fn resample(image: ArrayView3<'_, f32>, height: usize, width: usize) -> Result<Array3<f32>> {
    let (src_height, src_width, channels) = image.dim();
    if (src_height, src_width) == (height, width) {
        return Ok(image.to_owned());
    }

    let (src_w, src_h) = (dim_u32(src_width)?, dim_u32(src_height)?);
    let (dst_w, dst_h) = (dim_u32(width)?, dim_u32(height)?);
    let data: Vec<f32> = image.iter().copied().collect();

    let raw = match channels {
        1 => {
            let buffer = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(src_w, src_h, data)
                .ok_or_else(|| buffer_mismatch(src_height, src_width, channels))?;
            image::imageops::resize(&buffer, dst_w, dst_h, FilterType::Lanczos3).into_raw()
        }
        RGB_CHANNELS => {
            let buffer = ImageBuffer::<Rgb<f32>, Vec<f32>>::from_raw(src_w, src_h, data)
                .ok_or_else(|| buffer_mismatch(src_height, src_width, channels))?;
            image::imageops::resize(&buffer, dst_w, dst_h, FilterType::Lanczos3).into_raw()
        }
        _ => return Err(Error::UnsupportedChannels { channels }),
    };

    Array3::from_shape_vec((height, width, channels), raw).map_err(|err| Error::ShapeMismatch {
        expected: format!("({height}, {width}, {channels})"),
        actual: err.to_string(),
    })
}

/// Resize `image` so its longer side equals `target_size`, then pad the
/// shorter side on the bottom or right edge up to the next multiple of
/// [`ALIGNMENT`].
///
/// Padding pixels repeat the maximum of the row or column they extend.
///
/// # Errors
///
/// Returns [`Error::UnalignedSize`] if `target_size` is not aligned, and
/// usage errors for empty or non-RGB-convertible images.
pub fn resize_pad(
    image: ArrayView3<'_, f32>,
    target_size: usize,
) -> Result<(ColorImage, PaddingRecord)> {
    check_alignment(target_size)?;

    let rgb = to_rgb(image)?;
    let (height, width, _) = rgb.dim();
    if height == 0 || width == 0 {
        return Err(Error::EmptyImage { height, width });
    }

    let (new_height, new_width) = scaled_dims(height, width, target_size);
    let resized = resample(rgb.view(), new_height, new_width)?;

    let padding = PaddingRecord {
        bottom: align_up(new_height) - new_height,
        right: align_up(new_width) - new_width,
    };

    debug!(
        "Resized {height}x{width} -> {new_height}x{new_width}, padding bottom={} right={}",
        padding.bottom, padding.right
    );

    Ok((pad_with_edge_maximum(resized.view(), padding), padding))
}

/// Pad with the maximum value of each row (right edge) and column (bottom edge).
fn pad_with_edge_maximum(image: ArrayView3<'_, f32>, padding: PaddingRecord) -> Array3<f32> {
    let (height, width, channels) = image.dim();
    let mut canvas = Array3::<f32>::zeros((height + padding.bottom, width + padding.right, channels));
    canvas.slice_mut(s![..height, ..width, ..]).assign(&image);

    if padding.right > 0 {
        let row_peak = image.fold_axis(Axis(1), f32::NEG_INFINITY, |&acc, &v| acc.max(v));
        canvas
            .slice_mut(s![..height, width.., ..])
            .assign(&row_peak.insert_axis(Axis(1)));
    }

    if padding.bottom > 0 {
        let column_peak = canvas
            .slice(s![..height, .., ..])
            .fold_axis(Axis(0), f32::NEG_INFINITY, |&acc, &v| acc.max(v));
        canvas
            .slice_mut(s![height.., .., ..])
            .assign(&column_peak.insert_axis(Axis(0)));
    }

    canvas
}

/// Place `image` in the top-left corner of a zero canvas grown by `padding`.
#[must_use]
pub fn pad_zeros(image: ArrayView3<'_, f32>, padding: PaddingRecord) -> Array3<f32> {
    let (height, width, channels) = image.dim();
    let mut canvas = Array3::<f32>::zeros((height + padding.bottom, width + padding.right, channels));
    canvas.slice_mut(s![..height, ..width, ..]).assign(&image);
    canvas
}

/// Strip the rows and columns recorded in `padding` from an HWC image.
///
/// A zero record returns the image unchanged.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the padding exceeds the image.
pub fn crop_padding(image: ArrayView3<'_, f32>, padding: PaddingRecord) -> Result<ColorImage> {
    let (height, width, _) = image.dim();
    if padding.bottom >= height || padding.right >= width {
        return Err(Error::ShapeMismatch {
            expected: format!(
                "image larger than padding bottom={} right={}",
                padding.bottom, padding.right
            ),
            actual: format!("{height}x{width}"),
        });
    }

    Ok(image
        .slice(s![..height - padding.bottom, ..width - padding.right, ..])
        .to_owned())
}

fn dim_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidParameter {
        name: "dimension".to_string(),
        reason: format!("{value} does not fit in u32"),
    })
}

fn buffer_mismatch(height: usize, width: usize, channels: usize) -> Error {
    Error::ShapeMismatch {
        expected: format!("{height}x{width}x{channels} buffer"),
        actual: "buffer length mismatch".to_string(),
    }
}
