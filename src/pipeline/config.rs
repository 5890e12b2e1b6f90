//! Pipeline configuration.

use crate::error::{Error, Result};
use crate::image::resize::check_alignment;
use crate::image::{DEFAULT_DENOISE_SIGMA, DEFAULT_SIZE};
use crate::model::{Device, ModelPaths};

/// Per-image preparation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Working size of the longer image side; must be a multiple of 32.
    pub size: usize,

    /// Run the denoiser before resizing.
    pub apply_denoise: bool,

    /// Denoiser noise level on the 0-255 scale.
    pub denoise_sigma: u32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            apply_denoise: true,
            denoise_sigma: DEFAULT_DENOISE_SIGMA,
        }
    }
}

impl PrepareOptions {
    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is unaligned or sigma is out of range.
    pub fn validate(&self) -> Result<()> {
        check_alignment(self.size)?;

        if self.denoise_sigma > 255 {
            return Err(Error::InvalidParameter {
                name: "denoise_sigma".to_string(),
                reason: "must be between 0 and 255".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration for the colorization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Working size of the longer image side; must be a multiple of 32.
    pub size: usize,

    /// Whether to denoise pages before colorization.
    pub apply_denoise: bool,

    /// Denoiser noise level on the 0-255 scale.
    pub denoise_sigma: u32,

    /// Color boost applied when saving (1.0 = unchanged).
    pub vibrancy: f32,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,

    /// Compute device for both models.
    pub device: Device,

    /// Model file locations.
    pub models: ModelPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            apply_denoise: true,
            denoise_sigma: DEFAULT_DENOISE_SIGMA,
            vibrancy: 1.0,
            output_quality: 95,
            device: Device::default(),
            models: ModelPaths::default(),
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.prepare_options().validate()?;

        if !self.vibrancy.is_finite() || self.vibrancy < 0.0 {
            return Err(Error::InvalidParameter {
                name: "vibrancy".to_string(),
                reason: "must be a finite, non-negative factor".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }

    /// Per-image options derived from this configuration.
    #[must_use]
    pub const fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            size: self.size,
            apply_denoise: self.apply_denoise,
            denoise_sigma: self.denoise_sigma,
        }
    }
}
