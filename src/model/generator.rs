//! The colorization generator.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::{HINT_CHANNELS, RGB_CHANNELS};

use super::{extract_array4, load_session, Device};

/// Channels of the generator input: RGB image followed by the 4-channel hint.
pub const GENERATOR_INPUT_CHANNELS: usize = RGB_CHANNELS + HINT_CHANNELS;

/// A pretrained colorization network.
pub trait Generator {
    /// Run one inference-only forward pass.
    ///
    /// `input` is `(1, 7, H, W)`; the result is the primary color output,
    /// `(1, 3, H, W)` with values in `[-1, 1]`. Auxiliary outputs are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the network rejects the input or fails.
    fn forward(&mut self, input: Array4<f32>) -> Result<Array4<f32>>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn forward(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        (**self).forward(input)
    }
}

/// Generator backed by an ONNX Runtime session.
///
/// ONNX Runtime keeps no autograd state, so every run is inference-only.
pub struct OnnxGenerator {
    session: Session,
}

impl OnnxGenerator {
    /// Load the generator weights from `path`.
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

impl Generator for OnnxGenerator {
    fn forward(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Tensor::from_array(input).map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        // First output is the color prediction; the rest are auxiliary
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "color output".to_string(),
                actual: "no output".to_string(),
            })?;

        extract_array4(&output)
    }
}
