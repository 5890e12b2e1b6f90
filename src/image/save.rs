//! Image saving utilities.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::ArrayView3;

use crate::error::{Error, Result};

use super::RGB_CHANNELS;

/// Save a colorized HWC image with values in `[0, 1]`.
///
/// The image is:
/// 1. Quantized to 8 bits
/// 2. Color-boosted by `vibrancy` (1.0 leaves it unchanged)
/// 3. Saved to the specified path (format inferred from extension)
///
/// # Errors
///
/// Returns an error if the image has the wrong shape or cannot be saved.
pub fn save_image<P: AsRef<Path>>(
    image: ArrayView3<'_, f32>,
    path: P,
    vibrancy: f32,
    quality: u8,
) -> Result<()> {
    let path = path.as_ref();

    let mut img = array_to_image(image)?;
    boost_color(&mut img, vibrancy);
    let final_img = DynamicImage::ImageRgb8(img);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            final_img
                .write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            final_img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Scale color saturation around each pixel's luminance.
///
/// `factor` 0.0 yields grayscale, 1.0 the original, larger values stronger
/// colors.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn boost_color(img: &mut RgbImage, factor: f32) {
    if (factor - 1.0).abs() < f32::EPSILON {
        return;
    }

    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        let gray = 0.299_f32.mul_add(r, 0.587_f32.mul_add(g, 0.114 * b));
        // Safe: clamped to [0, 255] before casting
        pixel.0 = [r, g, b].map(|v| factor.mul_add(v - gray, gray).round().clamp(0.0, 255.0) as u8);
    }
}

/// Convert a unit-range HWC array to an 8-bit RGB image.
#[allow(clippy::cast_possible_truncation)]
fn array_to_image(image: ArrayView3<'_, f32>) -> Result<RgbImage> {
    let (height, width, channels) = image.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::UnsupportedChannels { channels });
    }
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(Error::InvalidParameter {
            name: "image".to_string(),
            reason: format!("{height}x{width} exceeds the encoder limits"),
        });
    };

    Ok(ImageBuffer::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            denormalize(image[[y, x, 0]]),
            denormalize(image[[y, x, 1]]),
            denormalize(image[[y, x, 2]]),
        ])
    }))
}

/// Denormalize a value from [0, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    (value * 255.0).clamp(0.0, 255.0) as u8
}
