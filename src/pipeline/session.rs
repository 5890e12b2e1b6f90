//! Stateful single-image session over [`Colorizer`].
//!
//! ```text
//! EMPTY --set_image--> READY --update_hint*--> READY --colorize--> EMPTY
//! ```

use ndarray::ArrayView2;
use ndarray::ArrayView3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::image::{ColorImage, Hint};
use crate::model::{Denoiser, Generator, OnnxDenoiser, OnnxGenerator};

use super::colorizer::Colorizer;
use super::config::{Config, PrepareOptions};
use super::working_set::WorkingSet;

/// Holds at most one image's working set between calls.
pub struct InferenceSession<G = OnnxGenerator, D = OnnxDenoiser> {
    colorizer: Colorizer<G, D>,
    working: Option<WorkingSet>,
}

impl InferenceSession {
    /// Load the models named in `config` into an empty session.
    ///
    /// # Errors
    ///
    /// Returns an error if the models cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Colorizer::from_config(config)?))
    }
}

impl<G: Generator, D: Denoiser> InferenceSession<G, D> {
    /// Create an empty session.
    pub const fn new(colorizer: Colorizer<G, D>) -> Self {
        Self {
            colorizer,
            working: None,
        }
    }

    /// Load a new image, discarding any previous one first.
    ///
    /// The session is empty if this fails.
    ///
    /// # Errors
    ///
    /// See [`Colorizer::prepare`].
    pub fn set_image(&mut self, image: ArrayView3<'_, f32>, options: &PrepareOptions) -> Result<()> {
        self.release();
        self.working = Some(self.colorizer.prepare(image, options)?);
        Ok(())
    }

    /// Replace the current hint. Hints are not merged across calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] without an image, or a usage error if
    /// the hint does not match the working canvas. The current hint is kept
    /// on error.
    pub fn update_hint(&mut self, hint: &Hint, mask: ArrayView2<'_, f32>) -> Result<()> {
        self.working
            .as_mut()
            .ok_or(Error::NoImageLoaded)?
            .set_hint(hint, mask)
    }

    /// Colorize the current image and reset the session.
    ///
    /// The session is empty afterwards whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] without an image, and any
    /// [`Colorizer::colorize`] error.
    pub fn colorize(&mut self) -> Result<ColorImage> {
        let working = self.working.take().ok_or(Error::NoImageLoaded)?;
        self.colorizer.colorize(working)
    }

    /// Drop the current working set, if any.
    pub fn release(&mut self) {
        if let Some(working) = self.working.take() {
            debug!("Releasing {} bytes of working state", working.resident_bytes());
        }
    }

    /// Whether an image is loaded.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.working.is_some()
    }

    /// The current working set, e.g. to read its canvas size for hints.
    #[must_use]
    pub const fn working_set(&self) -> Option<&WorkingSet> {
        self.working.as_ref()
    }

    /// Bytes held by the current working set.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.working.as_ref().map_or(0, WorkingSet::resident_bytes)
    }

    /// The models behind this session.
    #[must_use]
    pub const fn colorizer(&self) -> &Colorizer<G, D> {
        &self.colorizer
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::{PaddingRecord, ALIGNMENT};
    use crate::model::GENERATOR_INPUT_CHANNELS;
    use ndarray::{s, Array2, Array3, Array4};

    /// Echoes the hint colors (input channels 3..6) as its output.
    #[derive(Default)]
    pub(crate) struct EchoGenerator {
        pub calls: usize,
        pub fail: bool,
    }

    impl Generator for EchoGenerator {
        fn forward(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
            self.calls += 1;
            if self.fail {
                return Err(Error::ShapeMismatch {
                    expected: "anything".to_string(),
                    actual: "forced failure".to_string(),
                });
            }
            assert_eq!(input.shape()[1], GENERATOR_INPUT_CHANNELS);
            Ok(input.slice(s![.., 3..6, .., ..]).to_owned())
        }
    }

    /// Replaces every pixel with a constant.
    #[derive(Default)]
    pub(crate) struct FlatDenoiser {
        pub calls: usize,
    }

    impl Denoiser for FlatDenoiser {
        fn denoise(&mut self, image: ArrayView3<'_, f32>, _sigma: u32) -> Result<ColorImage> {
            self.calls += 1;
            let (height, width, _) = image.dim();
            Ok(Array3::from_elem((height, width, 3), 0.25))
        }
    }

    pub(crate) fn session() -> InferenceSession<EchoGenerator, FlatDenoiser> {
        InferenceSession::new(Colorizer::new(
            EchoGenerator::default(),
            Some(FlatDenoiser::default()),
        ))
    }

    fn page(height: usize, width: usize) -> Array3<f32> {
        Array3::from_shape_fn((height, width, 3), |(y, x, _)| ((y + x) % 5) as f32 / 5.0)
    }

    fn no_denoise(size: usize) -> PrepareOptions {
        PrepareOptions {
            size,
            apply_denoise: false,
            denoise_sigma: 0,
        }
    }

    #[test]
    fn test_output_matches_source_dims() {
        let mut session = session();
        for (height, width) in [(500, 800), (800, 500), (100, 100), (577, 33)] {
            session
                .set_image(page(height, width).view(), &no_denoise(576))
                .unwrap();
            let result = session.colorize().unwrap();
            assert_eq!(result.dim(), (height, width, 3));
        }
    }

    #[test]
    fn test_landscape_scenario() {
        let mut session = session();
        session.set_image(page(500, 800).view(), &no_denoise(576)).unwrap();

        let working = session.working_set().unwrap();
        assert_eq!(working.canvas_dims(), (384, 576));
        assert_eq!(working.padding(), PaddingRecord { bottom: 24, right: 0 });
        assert_eq!(working.image().shape(), &[1, 3, 384, 576]);
        assert_eq!(working.hint().shape(), &[1, 4, 384, 576]);

        assert_eq!(session.colorize().unwrap().dim(), (500, 800, 3));
    }

    #[test]
    fn test_aligned_image_round_trip() {
        let mut session = session();
        session.set_image(page(384, 576).view(), &no_denoise(576)).unwrap();
        assert!(session.working_set().unwrap().padding().is_empty());

        let result = session.colorize().unwrap();
        assert_eq!(result.dim(), (384, 576, 3));
        // Blank hint echoed back: every channel is 0 * 0.5 + 0.5
        assert!(result.iter().all(|&v| (v - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn test_colorize_before_set_image() {
        let mut session = session();
        let err = session.colorize().unwrap_err();
        assert!(matches!(err, Error::NoImageLoaded));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(session.colorizer().generator().calls, 0);
    }

    #[test]
    fn test_update_hint_before_set_image() {
        let mut session = session();
        let hint = Hint::Unit(Array3::zeros((32, 32, 3)));
        let err = session
            .update_hint(&hint, Array2::zeros((32, 32)).view())
            .unwrap_err();
        assert!(matches!(err, Error::NoImageLoaded));
    }

    #[test]
    fn test_hint_does_not_leak_into_next_image() {
        let mut session = session();
        let image = page(64, 64);

        session.set_image(image.view(), &no_denoise(64)).unwrap();
        session
            .update_hint(
                &Hint::Unit(Array3::from_elem((64, 64, 3), 1.0)),
                Array2::ones((64, 64)).view(),
            )
            .unwrap();
        let hinted = session.colorize().unwrap();
        assert!(hinted.iter().all(|&v| (v - 1.0).abs() < 1e-3));

        session.set_image(image.view(), &no_denoise(64)).unwrap();
        let plain = session.colorize().unwrap();
        assert!(plain.iter().all(|&v| (v - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_hint_for_other_image_is_rejected() {
        let mut session = session();
        session.set_image(page(64, 64).view(), &no_denoise(64)).unwrap();

        let hint = Hint::Unit(Array3::zeros((32, 32, 3)));
        let err = session
            .update_hint(&hint, Array2::ones((32, 32)).view())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(session.is_ready());
    }

    #[test]
    fn test_unaligned_size_fails_before_denoising() {
        let mut session = session();
        session.set_image(page(64, 64).view(), &no_denoise(64)).unwrap();

        let options = PrepareOptions {
            size: 500,
            ..PrepareOptions::default()
        };
        let err = session.set_image(page(64, 64).view(), &options).unwrap_err();

        assert!(matches!(err, Error::UnalignedSize { size: 500, .. }));
        assert_eq!(session.colorizer().denoiser().unwrap().calls, 0);
        // The previous image was released before validation
        assert!(!session.is_ready());
    }

    #[test]
    fn test_denoiser_runs_when_enabled() {
        let mut session = session();
        session
            .set_image(page(64, 64).view(), &PrepareOptions { size: 64, ..PrepareOptions::default() })
            .unwrap();

        assert_eq!(session.colorizer().denoiser().unwrap().calls, 1);
        let image = session.working_set().unwrap().image();
        assert!(image.iter().all(|&v| (v - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_denoise_without_denoiser() {
        let mut session: InferenceSession<EchoGenerator, FlatDenoiser> =
            InferenceSession::new(Colorizer::new(EchoGenerator::default(), None));
        let err = session
            .set_image(page(64, 64).view(), &PrepareOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::DenoiserUnavailable));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_generator_failure_resets_session() {
        let mut session = InferenceSession::new(Colorizer::<_, FlatDenoiser>::new(
            EchoGenerator {
                calls: 0,
                fail: true,
            },
            None,
        ));
        session.set_image(page(64, 64).view(), &no_denoise(64)).unwrap();

        let err = session.colorize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(!session.is_ready());
        assert_eq!(session.resident_bytes(), 0);
        assert!(matches!(session.colorize(), Err(Error::NoImageLoaded)));
    }

    #[test]
    fn test_resident_state_is_bounded_across_batch() {
        let mut session = session();
        let image = page(40, 70);
        let options = no_denoise(64);
        let mut ready_bytes = None;

        for _ in 0..200 {
            session.set_image(image.view(), &options).unwrap();
            let bytes = session.resident_bytes();
            assert_eq!(*ready_bytes.get_or_insert(bytes), bytes);

            session.colorize().unwrap();
            assert_eq!(session.resident_bytes(), 0);
            assert!(session.working_set().is_none());
        }

        assert_eq!(session.colorizer().generator().calls, 200);
    }

    #[test]
    fn test_set_image_replaces_previous() {
        let mut session = session();
        session.set_image(page(64, 32).view(), &no_denoise(64)).unwrap();
        session.set_image(page(32, 64).view(), &no_denoise(64)).unwrap();

        assert_eq!(session.working_set().unwrap().source_dims(), (32, 64));
        assert_eq!(session.colorize().unwrap().dim(), (32, 64, 3));
    }

    #[test]
    fn test_every_aligned_size_round_trips() {
        let mut session = session();
        let image = page(333, 517);

        for size in (ALIGNMENT..=1024).step_by(ALIGNMENT) {
            session.set_image(image.view(), &no_denoise(size)).unwrap();

            let working = session.working_set().unwrap();
            let (height, width) = working.canvas_dims();
            assert_eq!(height % ALIGNMENT, 0, "size {size}");
            assert_eq!(width, size, "size {size}");
            assert!(working.padding().bottom < ALIGNMENT, "size {size}");
            assert_eq!(working.padding().right, 0, "size {size}");

            assert_eq!(session.colorize().unwrap().dim(), (333, 517, 3), "size {size}");
        }
    }

    #[test]
    fn test_pixel_hint_through_session() {
        let mut session = session();
        session.set_image(page(64, 64).view(), &no_denoise(64)).unwrap();

        let mut pixels = Array3::<u8>::zeros((64, 64, 3));
        pixels.slice_mut(s![.., .., 0]).fill(255);
        let mut mask = Array2::<f32>::zeros((64, 64));
        mask.slice_mut(s![..32, ..]).fill(1.0);
        session.update_hint(&Hint::Pixels(pixels), mask.view()).unwrap();

        let result = session.colorize().unwrap();
        // Masked rows echo pure red, the rest the blank hint
        assert!((result[[10, 10, 0]] - 1.0).abs() < 1e-3);
        assert!(result[[10, 10, 1]].abs() < 1e-3);
        assert!((result[[50, 10, 0]] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_empty_image_is_rejected_before_denoising() {
        let mut session = session();
        let err = session
            .set_image(Array3::<f32>::zeros((0, 10, 3)).view(), &PrepareOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::EmptyImage { height: 0, width: 10 }));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(session.colorizer().denoiser().unwrap().calls, 0);
        assert!(!session.is_ready());
    }
}
