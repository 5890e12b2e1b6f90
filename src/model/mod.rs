//! ONNX-backed generator and denoiser.

mod denoiser;
mod generator;
mod loader;

pub use denoiser::{Denoiser, OnnxDenoiser, MAX_DENOISE_SIDE};
pub use generator::{Generator, OnnxGenerator, GENERATOR_INPUT_CHANNELS};
pub use loader::{load_session, Device, ModelPaths, ModelType};

use ndarray::Array4;

use crate::error::{Error, Result};

/// Extract a 4D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}
