//! Image loading utilities.

use std::path::Path;

use image::DynamicImage;
use ndarray::{Array2, Array3};

use crate::error::{Error, Result};

use super::{ColorImage, RGB_CHANNELS};

/// Load an image from disk as an RGB HWC array with values in `[0, 1]`.
///
/// Grayscale pages are expanded to three channels and alpha is dropped.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ColorImage> {
    let img = open(path.as_ref())?;
    image_to_array(&img)
}

/// Load a mask image from disk as a single-channel array in `[0, 1]`.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    let img = open(path.as_ref())?;
    let luma = img.to_luma32f();
    let (width, height) = luma.dimensions();

    Array2::from_shape_vec((height as usize, width as usize), luma.into_raw()).map_err(|err| {
        Error::ShapeMismatch {
            expected: format!("{height}x{width} mask"),
            actual: err.to_string(),
        }
    })
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert a `DynamicImage` to a normalized HWC array.
fn image_to_array(img: &DynamicImage) -> Result<ColorImage> {
    let rgb = img.to_rgb32f();
    let (width, height) = rgb.dimensions();

    Array3::from_shape_vec(
        (height as usize, width as usize, RGB_CHANNELS),
        rgb.into_raw(),
    )
    .map_err(|err| Error::ShapeMismatch {
        expected: format!("{height}x{width} RGB image"),
        actual: err.to_string(),
    })
}
