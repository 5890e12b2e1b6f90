//! Optional denoising before colorization.

use std::path::Path;

use ndarray::{concatenate, s, Array1, Array3, ArrayView3, Axis};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::resize::{resample, to_rgb};
use crate::image::{chw_to_hwc, hwc_to_nchw, ColorImage};

use super::{extract_array4, load_session, Device};

/// Longer image side above which input is downscaled before denoising.
pub const MAX_DENOISE_SIDE: usize = 1200;

/// Removes scan noise from an image.
pub trait Denoiser {
    /// Denoise an HWC image in `[0, 1]` at noise level `sigma` (0-255 scale).
    ///
    /// The result is RGB with the input's layout; it may be smaller than the
    /// input if the implementation caps its working resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails.
    fn denoise(&mut self, image: ArrayView3<'_, f32>, sigma: u32) -> Result<ColorImage>;
}

impl<D: Denoiser + ?Sized> Denoiser for Box<D> {
    fn denoise(&mut self, image: ArrayView3<'_, f32>, sigma: u32) -> Result<ColorImage> {
        (**self).denoise(image, sigma)
    }
}

/// FFDNet-style denoiser backed by an ONNX Runtime session.
///
/// The model takes `(image, sigma)` and predicts the noise, which is then
/// subtracted from the input.
pub struct OnnxDenoiser {
    session: Session,
}

impl OnnxDenoiser {
    /// Load the denoiser weights from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load(path: &Path, device: Device) -> Result<Self> {
        Ok(Self::from_session(load_session(path, device)?))
    }

    /// Wrap an already built session.
    #[must_use]
    pub const fn from_session(session: Session) -> Self {
        Self { session }
    }
}

impl Denoiser for OnnxDenoiser {
    #[allow(clippy::cast_precision_loss)]
    fn denoise(&mut self, image: ArrayView3<'_, f32>, sigma: u32) -> Result<ColorImage> {
        let rgb = to_rgb(image)?;
        let (height, width, _) = rgb.dim();
        let (height, width) = denoise_dims(height, width);
        let rgb = resample(rgb.view(), height, width)?;

        let noisy = hwc_to_nchw(pad_to_even(rgb.view())?.view());

        let image_value =
            Tensor::from_array(noisy.clone()).map_err(|source| Error::Inference { source })?;
        let sigma_value = Tensor::from_array(Array1::from_vec(vec![sigma as f32 / 255.0]))
            .map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![image_value, sigma_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "noise estimate output".to_string(),
                actual: "no output".to_string(),
            })?;
        let noise = extract_array4(&output)?;

        if noise.dim() != noisy.dim() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", noisy.dim()),
                actual: format!("{:?}", noise.dim()),
            });
        }

        let clean = (noisy - noise).mapv_into(|v| v.clamp(0.0, 1.0));
        let clean = chw_to_hwc(clean.index_axis(Axis(0), 0));

        Ok(clean.slice(s![..height, ..width, ..]).to_owned())
    }
}

/// Working dimensions for the denoiser: the longer side is capped at
/// [`MAX_DENOISE_SIDE`].
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn denoise_dims(height: usize, width: usize) -> (usize, usize) {
    let long_side = height.max(width);
    if long_side <= MAX_DENOISE_SIDE {
        return (height, width);
    }

    let ratio = long_side as f64 / MAX_DENOISE_SIDE as f64;
    // Safe: both results are below the original dimensions
    (
        ((height as f64 / ratio) as usize).max(1),
        ((width as f64 / ratio) as usize).max(1),
    )
}

/// Replicate the last row and/or column so both dimensions are even.
fn pad_to_even(image: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
    let (height, width, _) = image.dim();
    let mut padded = image.to_owned();

    if height % 2 == 1 {
        padded = concatenate(Axis(0), &[padded.view(), padded.slice(s![-1.., .., ..])])
            .map_err(shape_error)?;
    }
    if width % 2 == 1 {
        padded = concatenate(Axis(1), &[padded.view(), padded.slice(s![.., -1.., ..])])
            .map_err(shape_error)?;
    }

    Ok(padded)
}

fn shape_error(err: ndarray::ShapeError) -> Error {
    Error::ShapeMismatch {
        expected: "even-sized denoiser input".to_string(),
        actual: err.to_string(),
    }
}
