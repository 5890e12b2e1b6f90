//! Stateless colorization: prepare a working set, then colorize it.

use ndarray::ArrayView3;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::image::{hwc_to_nchw, resize_pad, ColorImage};
use crate::model::{Denoiser, Generator, OnnxDenoiser, OnnxGenerator};

use super::config::{Config, PrepareOptions};
use super::working_set::WorkingSet;

/// The loaded models. Holds no per-image state.
pub struct Colorizer<G = OnnxGenerator, D = OnnxDenoiser> {
    generator: G,
    denoiser: Option<D>,
}

impl Colorizer {
    /// Load the models named in `config`.
    ///
    /// The denoiser is only loaded when `config.apply_denoise` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a model cannot be
    /// loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        info!("Initializing colorizer on {}", config.device);

        info!("Loading generator...");
        let generator = OnnxGenerator::load(&config.models.generator, config.device)?;

        let denoiser = if config.apply_denoise {
            info!("Loading denoiser...");
            Some(OnnxDenoiser::load(&config.models.denoiser, config.device)?)
        } else {
            None
        };

        info!("Colorizer initialized successfully");
        Ok(Self::new(generator, denoiser))
    }
}

impl<G: Generator, D: Denoiser> Colorizer<G, D> {
    /// Assemble a colorizer from its collaborators.
    pub const fn new(generator: G, denoiser: Option<D>) -> Self {
        Self {
            generator,
            denoiser,
        }
    }

    /// The generator, e.g. to inspect a mock after a run.
    #[must_use]
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// The denoiser, if one was loaded.
    #[must_use]
    pub const fn denoiser(&self) -> Option<&D> {
        self.denoiser.as_ref()
    }

    /// Denoise, resize and pad an HWC image in `[0, 1]` into a fresh working
    /// set with a blank hint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnalignedSize`] before any work if the size is not
    /// aligned, [`Error::EmptyImage`] for an image without pixels,
    /// [`Error::DenoiserUnavailable`] if denoising is requested
    /// without a denoiser, and any denoiser failure unchanged.
    pub fn prepare(
        &mut self,
        image: ArrayView3<'_, f32>,
        options: &PrepareOptions,
    ) -> Result<WorkingSet> {
        options.validate()?;

        let (height, width, _) = image.dim();
        if height == 0 || width == 0 {
            return Err(Error::EmptyImage { height, width });
        }

        let denoised;
        let source = if options.apply_denoise {
            let denoiser = self.denoiser.as_mut().ok_or(Error::DenoiserUnavailable)?;
            debug!("Denoising {height}x{width} at sigma {}", options.denoise_sigma);
            denoised = denoiser.denoise(image, options.denoise_sigma)?;
            denoised.view()
        } else {
            image.view()
        };

        let (padded, padding) = resize_pad(source, options.size)?;
        let working = WorkingSet::new(hwc_to_nchw(padded.view()), padding, (height, width));

        debug!(
            "Prepared {height}x{width} on a {:?} canvas",
            working.canvas_dims()
        );
        Ok(working)
    }

    /// Run the generator on a working set and return the colorized image at
    /// the source dimensions, HWC in `[0, 1]`.
    ///
    /// The working set is consumed and freed whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns generator failures unchanged and [`Error::ShapeMismatch`] if
    /// the output does not match the working canvas.
    pub fn colorize(&mut self, working: WorkingSet) -> Result<ColorImage> {
        let (input, layout) = working.into_generator_input()?;

        debug!("Running generator on {:?}", input.dim());
        let output = self.generator.forward(input)?;

        layout.restore(output.view())
    }
}
